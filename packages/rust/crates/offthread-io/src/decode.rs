//! Default decoder backed by the `image` crate.
//!
//! Decoding is CPU-bound, so it runs on tokio's blocking pool.

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use offthread_img::{Bitmap, DecodeError, Decoder};

/// Default edge-length limit in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// Config for [`ImageDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    /// Maximum allowed width or height. `0` disables the limit.
    pub max_dimension: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Decodes PNG, JPEG, GIF, WebP and BMP into RGBA8 bitmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    config: DecoderConfig,
}

impl ImageDecoder {
    /// Decoder with the given limits.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decode on the current thread.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Empty`] for no input, [`DecodeError::Unsupported`] when
    /// the format is not recognized, [`DecodeError::TooLarge`] when either edge
    /// exceeds the limit, [`DecodeError::Malformed`] otherwise.
    pub fn decode_sync(&self, bytes: &[u8]) -> Result<Bitmap, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let format =
            image::guess_format(bytes).map_err(|error| DecodeError::Unsupported(error.to_string()))?;

        // Header dimensions first, so oversized images are rejected before
        // their pixels are allocated.
        if let Some((width, height)) = header_dimensions(bytes, format) {
            self.enforce_limit(width, height)?;
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|error| DecodeError::Malformed(error.to_string()))?;
        self.enforce_limit(decoded.width(), decoded.height())?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Bitmap::from_rgba8(width, height, rgba.into_raw())
            .ok_or_else(|| DecodeError::Malformed("pixel buffer size mismatch".to_string()))
    }

    fn enforce_limit(&self, width: u32, height: u32) -> Result<(), DecodeError> {
        let limit = self.config.max_dimension;
        if limit > 0 && (width > limit || height > limit) {
            return Err(DecodeError::TooLarge {
                width,
                height,
                limit,
            });
        }
        Ok(())
    }
}

fn header_dimensions(bytes: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .ok()
}

#[async_trait]
impl Decoder for ImageDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> Result<Bitmap, DecodeError> {
        let decoder = *self;
        tokio::task::spawn_blocking(move || decoder.decode_sync(&bytes))
            .await
            .map_err(|error| DecodeError::Malformed(format!("decode task failed: {error}")))?
    }
}
