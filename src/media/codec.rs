use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use std::fmt;

use super::compress::CompressError;

/// JPEG quality in tenths, from 0.1 to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    /// Quality of the first encode
    pub const INITIAL: Quality = Quality(9);
    /// Lowest quality the compressor will go to
    pub const FLOOR: Quality = Quality(1);

    pub fn tenths(self) -> u8 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / 10.0
    }

    /// Encoder scale, 1-100
    pub fn percent(self) -> u8 {
        self.0 * 10
    }

    /// One step lower, or `None` at the floor
    pub fn step_down(self) -> Option<Self> {
        (self > Self::FLOOR).then(|| Quality(self.0 - 1))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f32())
    }
}

/// Raster decode/encode capability the compressor runs on
///
/// The compression algorithm only needs these four operations, so it
/// works with any codec library that can supply them.
pub trait ImageCodec: Send + Sync {
    type Raster: Send;

    /// Decode an encoded image file into a raster
    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster, CompressError>;

    /// (width, height) in pixels
    fn dimensions(&self, raster: &Self::Raster) -> (u32, u32);

    /// Draw the raster onto a surface of exactly `width` x `height`
    fn resize(
        &self,
        raster: Self::Raster,
        width: u32,
        height: u32,
    ) -> Result<Self::Raster, CompressError>;

    /// Encode as JPEG at `quality`
    fn encode_jpeg(
        &self,
        raster: &Self::Raster,
        quality: Quality,
    ) -> Result<Vec<u8>, CompressError>;
}

/// Codec backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageRsCodec {
    filter: FilterType,
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl ImageRsCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageCodec for ImageRsCodec {
    type Raster = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CompressError> {
        image::load_from_memory(bytes).map_err(|e| CompressError::Decode(e.to_string()))
    }

    fn dimensions(&self, raster: &DynamicImage) -> (u32, u32) {
        (raster.width(), raster.height())
    }

    fn resize(
        &self,
        raster: DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, CompressError> {
        if width == 0 || height == 0 {
            return Err(CompressError::Surface { width, height });
        }
        if raster.width() == width && raster.height() == height {
            return Ok(raster);
        }
        Ok(raster.resize_exact(width, height, self.filter))
    }

    fn encode_jpeg(
        &self,
        raster: &DynamicImage,
        quality: Quality,
    ) -> Result<Vec<u8>, CompressError> {
        // JPEG has no alpha channel; transparent pixels lose it here
        let rgb = raster.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.percent());
        encoder
            .encode_image(&rgb)
            .map_err(|e| CompressError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}
