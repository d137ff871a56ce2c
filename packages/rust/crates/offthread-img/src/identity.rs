//! Resource identities: the normalized absolute URL used as dedup key.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::CoordinatorError;

/// Normalized absolute URL. Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity(Arc<str>);

impl ResourceIdentity {
    /// Parse an absolute URL into its canonical identity.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidUrl`] if `raw` is not an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, CoordinatorError> {
        Url::parse(raw.trim())
            .map(|url| Self::from(&url))
            .map_err(|error| invalid_url(raw, &error))
    }

    /// Identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity as a parsed URL.
    ///
    /// Identities are produced from parsed URLs, so re-parsing only fails for
    /// values constructed by hand.
    #[must_use]
    pub fn to_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }
}

impl From<&Url> for ResourceIdentity {
    fn from(url: &Url) -> Self {
        Self(Arc::from(url.as_str()))
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The document location relative URLs are resolved against.
///
/// The default location has no href, so only absolute URLs resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLocation {
    href: Option<Url>,
}

impl DocumentLocation {
    /// Location from an absolute href.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidUrl`] if `href` is not absolute.
    pub fn parse(href: &str) -> Result<Self, CoordinatorError> {
        let href = Url::parse(href.trim()).map_err(|error| invalid_url(href, &error))?;
        Ok(Self { href: Some(href) })
    }

    /// Location of a directory on the local filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidUrl`] if `dir` is not absolute.
    pub fn from_directory(dir: &std::path::Path) -> Result<Self, CoordinatorError> {
        let href = Url::from_directory_path(dir).map_err(|()| CoordinatorError::InvalidUrl {
            raw: dir.display().to_string(),
            reason: "directory path must be absolute".to_string(),
        })?;
        Ok(Self { href: Some(href) })
    }

    /// The page href, if any.
    #[must_use]
    pub fn href(&self) -> Option<&Url> {
        self.href.as_ref()
    }

    /// Normalize `raw` into an identity.
    ///
    /// Absolute URLs are canonicalized as-is; anything else is joined onto the
    /// document href, which resolves it against the href's directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidUrl`] if `raw` is empty or cannot be
    /// resolved.
    pub fn normalize(&self, raw: &str) -> Result<ResourceIdentity, CoordinatorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoordinatorError::InvalidUrl {
                raw: raw.to_string(),
                reason: "empty url".to_string(),
            });
        }
        match Url::parse(trimmed) {
            Ok(url) => Ok(ResourceIdentity::from(&url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let Some(href) = &self.href else {
                    return Err(CoordinatorError::InvalidUrl {
                        raw: raw.to_string(),
                        reason: "relative url without a document location".to_string(),
                    });
                };
                href.join(trimmed)
                    .map(|url| ResourceIdentity::from(&url))
                    .map_err(|error| invalid_url(raw, &error))
            }
            Err(error) => Err(invalid_url(raw, &error)),
        }
    }
}

fn invalid_url(raw: &str, error: &url::ParseError) -> CoordinatorError {
    CoordinatorError::InvalidUrl {
        raw: raw.to_string(),
        reason: error.to_string(),
    }
}
