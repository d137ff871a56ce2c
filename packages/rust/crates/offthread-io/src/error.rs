//! Error types for building the default collaborators.
//!
//! Runtime failures use the coordinator's own error enums
//! (`FetchError`, `DecodeError`, `PaintError`); this enum only covers setup.

use thiserror::Error;

/// Failure to construct a collaborator.
#[derive(Error, Debug)]
pub enum IoError {
    /// The HTTP client could not be built (TLS backend, invalid user agent, ...).
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
