//! offthread-io - Default collaborators for offthread-img
//!
//! # Features
//!
//! - **Fetch**: `http`/`https` through reqwest (2xx only), `file` through tokio
//! - **Decode**: `image` crate on the blocking pool, RGBA8 output, edge limit
//! - **Paint**: PNG files under an output directory
//!
//! # Architecture
//!
//! ```text
//! offthread-io/src/
//! ├── lib.rs     # Re-exports (this file)
//! ├── error.rs   # IoError enum
//! ├── fetch.rs   # DefaultFetcher
//! ├── decode.rs  # ImageDecoder
//! └── paint.rs   # PngPainter
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

mod decode;
mod error;
mod fetch;
mod paint;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use decode::{DEFAULT_MAX_DIMENSION, DecoderConfig, ImageDecoder};
pub use error::IoError;
pub use fetch::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BYTES, DefaultFetcher, FetcherConfig};
pub use paint::PngPainter;

use std::path::PathBuf;
use std::sync::Arc;

use offthread_img::Collaborators;

/// Default fetcher, decoder and a PNG painter writing under `out_dir`.
///
/// # Errors
///
/// Returns [`IoError`] if the HTTP client cannot be built.
pub fn default_collaborators(
    fetcher: FetcherConfig,
    decoder: DecoderConfig,
    out_dir: impl Into<PathBuf>,
) -> Result<Collaborators, IoError> {
    Ok(Collaborators::new(
        Arc::new(DefaultFetcher::new(fetcher)?),
        Arc::new(ImageDecoder::new(decoder)),
        Arc::new(PngPainter::new(out_dir)),
    ))
}
