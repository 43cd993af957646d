/// Image handling module
///
/// This module handles:
/// - The codec capability and its `image` crate implementation (codec.rs)
/// - Resizing and iterative JPEG re-encoding into data URIs (compress.rs)
/// - The bounded image list of a listing form (attachments.rs)

pub mod attachments;
pub mod codec;
pub mod compress;

pub use attachments::{AddReport, ImageAttachments, DEFAULT_MAX_IMAGES};
pub use codec::{ImageCodec, ImageRsCodec, Quality};
pub use compress::{
    compress_bytes, compress_file, compress_image, compress_with, CompressError,
    CompressOptions, CompressedImage, DEFAULT_MAX_SIZE_BYTES, MAX_DIMENSION,
};
