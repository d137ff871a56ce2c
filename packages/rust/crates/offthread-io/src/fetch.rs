//! Default transport: `http`/`https` via reqwest, `file` via tokio.

use std::time::Duration;

use async_trait::async_trait;
use offthread_img::{FetchError, Fetcher, ResourceIdentity};
use reqwest::Client;
use url::Url;

use crate::error::IoError;

/// Default response size limit (32 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 32 * 1024 * 1024;

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Config for [`DefaultFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Largest accepted body in bytes.
    pub max_bytes: u64,
    /// HTTP request timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// `User-Agent` header sent with HTTP requests.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            timeout: Some(DEFAULT_FETCH_TIMEOUT),
            user_agent: concat!("offthread-img/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetches `http`, `https` and `file` URLs.
///
/// Any non-2xx HTTP status is a failure. A missing local file is reported like
/// an HTTP 404.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    client: Client,
    config: FetcherConfig,
}

impl DefaultFetcher {
    /// Build a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Client`] if the HTTP client cannot be constructed.
    pub fn new(config: FetcherConfig) -> Result<Self, IoError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let raw = url.to_string();
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| self.transport_error(&raw, &error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: raw,
                status: status.as_u16(),
            });
        }
        if let Some(announced) = response.content_length() {
            self.check_size(&raw, announced)?;
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| self.transport_error(&raw, &error))?
        {
            body.extend_from_slice(&chunk);
            self.check_size(&raw, body.len() as u64)?;
        }
        tracing::debug!(url = %raw, status = status.as_u16(), bytes = body.len(), "fetched over http");
        Ok(body)
    }

    async fn fetch_file(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let raw = url.to_string();
        let path = url.to_file_path().map_err(|()| FetchError::Network {
            url: raw.clone(),
            reason: "not a local file path".to_string(),
        })?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Status {
                    url: raw,
                    status: 404,
                });
            }
            Err(error) => {
                return Err(FetchError::Network {
                    url: raw,
                    reason: error.to_string(),
                });
            }
        };
        self.check_size(&raw, metadata.len())?;

        let body = tokio::fs::read(&path)
            .await
            .map_err(|error| FetchError::Network {
                url: raw.clone(),
                reason: error.to_string(),
            })?;
        tracing::debug!(url = %raw, bytes = body.len(), "fetched from disk");
        Ok(body)
    }

    fn check_size(&self, url: &str, bytes: u64) -> Result<(), FetchError> {
        if bytes > self.config.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                bytes,
                limit: self.config.max_bytes,
            });
        }
        Ok(())
    }

    fn transport_error(&self, url: &str, error: &reqwest::Error) -> FetchError {
        match self.config.timeout {
            Some(after) if error.is_timeout() => FetchError::TimedOut {
                url: url.to_string(),
                after,
            },
            _ => FetchError::Network {
                url: url.to_string(),
                reason: error.to_string(),
            },
        }
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Vec<u8>, FetchError> {
        let url = identity.to_url().ok_or_else(|| FetchError::Network {
            url: identity.to_string(),
            reason: "identity is not a valid url".to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => self.fetch_file(&url).await,
            scheme => Err(FetchError::UnsupportedScheme {
                url: identity.to_string(),
                scheme: scheme.to_string(),
            }),
        }
    }
}
