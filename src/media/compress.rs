/// Inline image compression
///
/// Turns an arbitrary image file into a JPEG data URI small enough to be
/// stored directly inside a catalog record. The pipeline is
/// decode → (optional) resize → encode → re-encode at lower quality,
/// and never touches disk or network.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::codec::{ImageCodec, ImageRsCodec, Quality};

/// Default payload ceiling (380 KiB)
pub const DEFAULT_MAX_SIZE_BYTES: usize = 380 * 1024;

/// Longest edge allowed after resizing
pub const MAX_DIMENSION: u32 = 1920;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode JPEG: {0}")]
    Encode(String),

    #[error("cannot draw a {width}x{height} image")]
    Surface { width: u32, height: u32 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compression task failed: {0}")]
    Join(String),
}

/// Knobs for one compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Target length of the returned data URI
    pub max_size_bytes: usize,
    /// Longest edge after resizing
    pub max_dimension: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_dimension: MAX_DIMENSION,
        }
    }
}

impl CompressOptions {
    pub fn with_max_size(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ..Self::default()
        }
    }
}

/// Outcome of a compression
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// Quality of the returned encode
    pub quality: Quality,
    /// Every quality tried, in order
    pub attempts: Vec<Quality>,
}

impl CompressedImage {
    /// Size measured against `max_size_bytes`
    pub fn size(&self) -> usize {
        self.data_uri.len()
    }

    /// False when the quality floor was reached and the result is still too big
    pub fn met_target(&self, max_size_bytes: usize) -> bool {
        self.size() <= max_size_bytes
    }
}

/// Fit (width, height) inside `max_dimension`, preserving aspect ratio
///
/// When width > height the width is clamped, otherwise the height. The
/// other edge is rounded half-up and never drops below one pixel.
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |edge: u32, long: u32| -> u32 {
        let scaled = (u64::from(edge) * u64::from(max_dimension) + u64::from(long) / 2)
            / u64::from(long);
        scaled.max(1) as u32
    };

    if width > height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Wrap JPEG bytes in a data URI
pub fn to_data_uri(jpeg: &[u8]) -> String {
    let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len().div_ceil(3) * 4);
    uri.push_str(DATA_URI_PREFIX);
    STANDARD.encode_string(jpeg, &mut uri);
    uri
}

/// Run the compression pipeline on `bytes` with `codec`
///
/// Quality starts at 0.9 and drops by 0.1 while the data URI is longer
/// than `max_size_bytes`, stopping at 0.1. Reaching the floor without
/// meeting the target is not an error; the last encode is returned.
pub fn compress_with<C: ImageCodec>(
    codec: &C,
    bytes: &[u8],
    options: &CompressOptions,
) -> Result<CompressedImage, CompressError> {
    let raster = codec.decode(bytes)?;
    let (src_width, src_height) = codec.dimensions(&raster);
    if src_width == 0 || src_height == 0 {
        return Err(CompressError::Surface {
            width: src_width,
            height: src_height,
        });
    }

    let (width, height) = fit_dimensions(src_width, src_height, options.max_dimension);
    let raster = if (width, height) != (src_width, src_height) {
        debug!("Resizing {}x{} -> {}x{}", src_width, src_height, width, height);
        codec.resize(raster, width, height)?
    } else {
        raster
    };

    let mut quality = Quality::INITIAL;
    let mut attempts = vec![quality];
    let mut data_uri = to_data_uri(&codec.encode_jpeg(&raster, quality)?);

    while data_uri.len() > options.max_size_bytes {
        let Some(lower) = quality.step_down() else {
            break;
        };
        quality = lower;
        attempts.push(quality);
        data_uri = to_data_uri(&codec.encode_jpeg(&raster, quality)?);
    }

    if data_uri.len() > options.max_size_bytes {
        info!(
            "Image still {} bytes at quality {} (target {}), keeping it",
            data_uri.len(),
            quality,
            options.max_size_bytes
        );
    }

    Ok(CompressedImage {
        data_uri,
        width,
        height,
        quality,
        attempts,
    })
}

/// Compress an image with the default `image` crate codec
///
/// CPU-bound work runs on a blocking task; each call owns its raster.
pub async fn compress_image(
    bytes: Vec<u8>,
    max_size_bytes: Option<usize>,
) -> Result<String, CompressError> {
    let options = CompressOptions::with_max_size(max_size_bytes.unwrap_or(DEFAULT_MAX_SIZE_BYTES));
    compress_bytes(bytes, options)
        .await
        .map(|compressed| compressed.data_uri)
}

/// Compress in-memory bytes on a blocking task, returning the full report
pub async fn compress_bytes(
    bytes: Vec<u8>,
    options: CompressOptions,
) -> Result<CompressedImage, CompressError> {
    tokio::task::spawn_blocking(move || compress_with(&ImageRsCodec::new(), &bytes, &options))
        .await
        .map_err(|e| CompressError::Join(e.to_string()))?
}

/// Read an image file and compress it
pub async fn compress_file(
    path: impl AsRef<Path>,
    options: CompressOptions,
) -> Result<CompressedImage, CompressError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| CompressError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let compressed = compress_bytes(bytes, options).await?;
    info!(
        "📸 Compressed {} to {}x{} at quality {} ({} KB)",
        path.display(),
        compressed.width,
        compressed.height,
        compressed.quality,
        compressed.size() / 1024
    );
    Ok(compressed)
}
