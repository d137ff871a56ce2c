//! External collaborators: fetch, decode and paint capabilities.
//!
//! The coordinator only talks to these traits, so transports, codecs and
//! rendering surfaces can be swapped (or replaced by test doubles).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DecodeError, FetchError, PaintError};
use crate::identity::ResourceIdentity;

/// Decoded, displayable image: tightly packed RGBA8 rows.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Wrap an RGBA8 buffer.
    ///
    /// Returns `None` if `pixels` is not exactly `width * height * 4` bytes.
    #[must_use]
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = Self::expected_len(width, height)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn expected_len(width: u32, height: u32) -> Option<usize> {
        usize::try_from(width)
            .ok()?
            .checked_mul(usize::try_from(height).ok()?)?
            .checked_mul(4)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Opaque handle naming where a consumer's bitmap is painted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaintTarget(String);

impl PaintTarget {
    /// Target from its name (element id, file path, ...).
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Target name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaintTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network (or filesystem) transport.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the bytes of one identity.
    ///
    /// Non-success responses are reported as [`FetchError::Status`].
    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Vec<u8>, FetchError>;
}

/// Image decode primitive.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode fetched bytes into a bitmap.
    async fn decode(&self, bytes: Vec<u8>) -> Result<Bitmap, DecodeError>;
}

/// Rendering surface.
#[async_trait]
pub trait Painter: Send + Sync {
    /// Draw `bitmap` into `target`.
    ///
    /// Invoked once per consumer with the same shared bitmap; implementations
    /// that move work to another thread should clone the `Arc`, not the pixels.
    async fn paint(&self, bitmap: Arc<Bitmap>, target: &PaintTarget) -> Result<(), PaintError>;
}
