//! Coordinator configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::identity::DocumentLocation;

/// Default number of concurrent fetch/decode pipelines.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Config for the request coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum in-flight fetch/decode pipelines. Must be at least 1.
    pub max_concurrency: usize,
    /// Per-fetch timeout; `None` waits for the fetcher indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Location relative request URLs are resolved against.
    pub location: DocumentLocation,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: None,
            location: DocumentLocation::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Validated concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroConcurrency`] when `max_concurrency` is 0.
    pub fn concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.max_concurrency).ok_or(ConfigError::ZeroConcurrency)
    }
}
