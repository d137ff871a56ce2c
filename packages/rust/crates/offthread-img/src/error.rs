//! Error types for image request coordination.
//!
//! Library crates use `thiserror` for explicit error enums. Pipeline errors
//! are `Clone` because one failure is delivered to every consumer waiting on
//! the same identity.

use std::time::Duration;

use thiserror::Error;

/// Failure of the fetch collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status code.
    #[error("Unable to load resource with url {url}: status {status}")]
    Status {
        /// Requested identity.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Transport-level failure (DNS, connection reset, unreadable file, ...).
    #[error("Network failure for {url}: {reason}")]
    Network {
        /// Requested identity.
        url: String,
        /// Underlying error text.
        reason: String,
    },

    /// The fetch did not settle within the configured timeout.
    #[error("Fetch of {url} timed out after {after:?}")]
    TimedOut {
        /// Requested identity.
        url: String,
        /// Configured timeout.
        after: Duration,
    },

    /// The response body exceeded the configured size limit.
    #[error("Resource {url} too large: {bytes} bytes (limit: {limit})")]
    TooLarge {
        /// Requested identity.
        url: String,
        /// Observed or announced size.
        bytes: u64,
        /// Configured limit.
        limit: u64,
    },

    /// No transport handles this URL scheme.
    #[error("Unsupported scheme '{scheme}' for {url}")]
    UnsupportedScheme {
        /// Requested identity.
        url: String,
        /// URL scheme.
        scheme: String,
    },
}

impl FetchError {
    /// Status code for `Status` failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of the decode collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No bytes to decode.
    #[error("Empty image data")]
    Empty,

    /// The format could not be recognized.
    #[error("Unsupported image format: {0}")]
    Unsupported(String),

    /// The bytes were recognized but are not a valid image.
    #[error("Malformed image data: {0}")]
    Malformed(String),

    /// Decoded dimensions exceed the configured limit.
    #[error("Image too large: {width}x{height} (limit: {limit})")]
    TooLarge {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Maximum allowed edge length.
        limit: u32,
    },
}

/// Failure of the paint collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaintError {
    /// The target could not accept the bitmap.
    #[error("Unable to paint into {target}: {reason}")]
    Target {
        /// Paint target name.
        target: String,
        /// Underlying error text.
        reason: String,
    },

    /// The bitmap buffer does not match its dimensions.
    #[error("Bitmap buffer is {len} bytes, expected {expected}")]
    InvalidBitmap {
        /// Actual buffer length.
        len: usize,
        /// Length implied by width x height x 4.
        expected: usize,
    },
}

/// A status name outside the defined set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status: {value}")]
pub struct InvalidStateError {
    /// The rejected value.
    pub value: String,
}

/// Terminal failure of one identity's pipeline, fanned out to its waiters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Fetch failed or returned a non-success status.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Bytes could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A collaborator panicked while processing the identity.
    #[error("Pipeline for {url} panicked: {reason}")]
    Panicked {
        /// Identity being processed.
        url: String,
        /// Panic payload text.
        reason: String,
    },

    /// The coordinator was torn down before the identity resolved.
    #[error("Coordinator shut down before the image resolved")]
    Shutdown,
}

/// Failure reported to a consumer's failure listeners.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerFailure {
    /// The load pipeline failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Painting the decoded bitmap failed.
    #[error(transparent)]
    Paint(#[from] PaintError),
}

/// Invalid coordinator configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A concurrency of zero would never start any pipeline.
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Errors returned to callers of the coordinator API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The requested URL cannot be normalized into an absolute identity.
    #[error("Invalid image url '{raw}': {reason}")]
    InvalidUrl {
        /// URL as supplied by the caller.
        raw: String,
        /// Parser error text.
        reason: String,
    },

    /// The coordinator has been torn down.
    #[error("Coordinator is shut down")]
    ShutDown,

    /// Started outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
