//! Settings loader for the offthread-img CLI.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/offthread-img/settings.yaml`
//!
//! Merge precedence is user over system. Command-line flags override both.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "offthread-img/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Merged settings file contents. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageSettings {
    /// Coordinator knobs.
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
    /// HTTP/file transport knobs.
    #[serde(default)]
    pub fetcher: FetcherSettings,
    /// Decoder limits.
    #[serde(default)]
    pub decoder: DecoderSettings,
    /// Where painted images go.
    #[serde(default)]
    pub output: OutputSettings,
}

/// `coordinator:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinatorSettings {
    /// Concurrent fetch/decode pipelines.
    pub max_concurrency: Option<usize>,
    /// Per-fetch timeout enforced by the coordinator.
    pub fetch_timeout_secs: Option<u64>,
    /// Base URL for relative arguments.
    pub base_url: Option<String>,
}

/// `fetcher:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetcherSettings {
    /// Largest accepted body.
    pub max_bytes: Option<u64>,
    /// HTTP client timeout.
    pub timeout_secs: Option<u64>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// `decoder:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecoderSettings {
    /// Largest accepted width or height; `0` disables the check.
    pub max_dimension: Option<u32>,
}

/// `output:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSettings {
    /// Default output directory.
    pub dir: Option<PathBuf>,
}

impl ImageSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            coordinator: self.coordinator.merge(overlay.coordinator),
            fetcher: self.fetcher.merge(overlay.fetcher),
            decoder: self.decoder.merge(overlay.decoder),
            output: self.output.merge(overlay.output),
        }
    }
}

impl CoordinatorSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            max_concurrency: overlay.max_concurrency.or(self.max_concurrency),
            fetch_timeout_secs: overlay.fetch_timeout_secs.or(self.fetch_timeout_secs),
            base_url: overlay.base_url.or(self.base_url),
        }
    }
}

impl FetcherSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            max_bytes: overlay.max_bytes.or(self.max_bytes),
            timeout_secs: overlay.timeout_secs.or(self.timeout_secs),
            user_agent: overlay.user_agent.or(self.user_agent),
        }
    }
}

impl DecoderSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            max_dimension: overlay.max_dimension.or(self.max_dimension),
        }
    }
}

impl OutputSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            dir: overlay.dir.or(self.dir),
        }
    }
}

/// Load merged settings (user overrides system).
pub fn load_settings() -> ImageSettings {
    let (system_path, user_path) = settings_paths();
    load_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> ImageSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> ImageSettings {
    if !path.exists() {
        return ImageSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return ImageSettings::default();
        }
    };
    match serde_yaml::from_str::<Option<ImageSettings>>(&raw) {
        Ok(value) => value.unwrap_or_default(),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            ImageSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
