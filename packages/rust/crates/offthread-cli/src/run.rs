//! `fetch` command: one consumer per URL, painted into an output directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use offthread_events::{EventBus, ImageEvent, topics};
use offthread_img::{
    ConsumerFailure, CoordinatorConfig, DEFAULT_MAX_CONCURRENCY, DocumentLocation, ImageConsumer,
    PaintTarget, Status, WorkerCoordinator,
};
use offthread_io::{DecoderConfig, FetcherConfig, default_collaborators};
use tokio::sync::{broadcast, mpsc};

use crate::settings::ImageSettings;

const DEFAULT_OUTPUT_DIR: &str = "images";

/// Command-line inputs of `fetch`; `None` falls back to settings.
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    /// URLs or paths to fetch, in order.
    pub urls: Vec<String>,
    /// Output directory.
    pub out_dir: Option<PathBuf>,
    /// Base URL for relative arguments.
    pub base: Option<String>,
    /// Concurrent pipelines.
    pub max_concurrency: Option<usize>,
    /// Per-fetch timeout.
    pub fetch_timeout_secs: Option<u64>,
}

/// Fully resolved `fetch` configuration.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// URLs or paths to fetch, in order.
    pub urls: Vec<String>,
    /// Output directory.
    pub out_dir: PathBuf,
    /// Coordinator config.
    pub coordinator: CoordinatorConfig,
    /// Transport config.
    pub fetcher: FetcherConfig,
    /// Decoder config.
    pub decoder: DecoderConfig,
}

impl FetchOptions {
    /// Merge flags over settings over defaults.
    ///
    /// Without a base URL, relative arguments resolve against the current
    /// directory, so local paths work as-is.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparsable base URL or an unknown working
    /// directory.
    pub fn resolve(args: FetchArgs, settings: &ImageSettings) -> Result<Self> {
        let location = match args.base.or_else(|| settings.coordinator.base_url.clone()) {
            Some(base) => DocumentLocation::parse(&base)
                .with_context(|| format!("invalid base url: {base}"))?,
            None => {
                let cwd = std::env::current_dir().context("failed to read working directory")?;
                DocumentLocation::from_directory(&cwd)
                    .context("working directory is not an absolute path")?
            }
        };

        let mut fetcher = FetcherConfig::default();
        if let Some(max_bytes) = settings.fetcher.max_bytes {
            fetcher.max_bytes = max_bytes;
        }
        if let Some(secs) = settings.fetcher.timeout_secs {
            fetcher.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(user_agent) = &settings.fetcher.user_agent {
            fetcher.user_agent.clone_from(user_agent);
        }

        let mut decoder = DecoderConfig::default();
        if let Some(max_dimension) = settings.decoder.max_dimension {
            decoder.max_dimension = max_dimension;
        }

        let fetch_timeout = args
            .fetch_timeout_secs
            .or(settings.coordinator.fetch_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            urls: args.urls,
            out_dir: args
                .out_dir
                .or_else(|| settings.output.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            coordinator: CoordinatorConfig {
                max_concurrency: args
                    .max_concurrency
                    .or(settings.coordinator.max_concurrency)
                    .unwrap_or(DEFAULT_MAX_CONCURRENCY),
                fetch_timeout,
                location,
            },
            fetcher,
            decoder,
        })
    }
}

/// Result for one requested URL.
#[derive(Debug, Clone)]
pub struct ImageReport {
    /// URL as given.
    pub url: String,
    /// File the image was (or would have been) painted into.
    pub target: PathBuf,
    /// `Err` carries the failure text.
    pub result: Result<(), String>,
}

/// Results of one `fetch` run, in argument order.
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    /// One report per URL.
    pub reports: Vec<ImageReport>,
}

impl FetchSummary {
    /// Images written.
    #[must_use]
    pub fn painted(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_ok()).count()
    }

    /// Images that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.painted()
    }
}

enum Settled {
    Painted(usize),
    Failed(usize, String),
}

/// Fetch, decode and paint every URL, waiting until each one has settled.
///
/// # Errors
///
/// Returns an error if the collaborators or coordinator cannot be created.
/// Per-image failures are reported in the summary instead.
pub async fn run_fetch(options: FetchOptions) -> Result<FetchSummary> {
    let collaborators = default_collaborators(options.fetcher, options.decoder, &options.out_dir)
        .context("failed to build image collaborators")?;
    let bus = EventBus::default();
    let progress = spawn_progress_logger(bus.subscribe());
    let coordinator = WorkerCoordinator::start_with_bus(collaborators, options.coordinator, bus)
        .context("failed to start image coordinator")?;

    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel();
    let mut reports = Vec::with_capacity(options.urls.len());
    let mut consumers = Vec::with_capacity(options.urls.len());
    let mut outstanding = 0_usize;

    for (index, url) in options.urls.iter().enumerate() {
        let name = output_name(index, url);
        let consumer = ImageConsumer::new(PaintTarget::new(name.clone()));
        watch_consumer(&consumer, index, &settled_tx);

        let result = match coordinator.request(&consumer, url) {
            Ok(identity) => {
                tracing::debug!(url = %url, identity = %identity, target = %name, "queued");
                outstanding += 1;
                Ok(())
            }
            Err(error) => Err(error.to_string()),
        };
        reports.push(ImageReport {
            url: url.clone(),
            target: options.out_dir.join(&name),
            result,
        });
        consumers.push(consumer);
    }
    drop(settled_tx);

    while outstanding > 0 {
        let Some(settled) = settled_rx.recv().await else {
            break;
        };
        let (index, result) = match settled {
            Settled::Painted(index) => (index, Ok(())),
            Settled::Failed(index, error) => (index, Err(error)),
        };
        if let Some(report) = reports.get_mut(index) {
            report.result = result;
        }
        outstanding -= 1;
    }

    coordinator.shutdown();
    progress.abort();
    drop(consumers);
    Ok(FetchSummary { reports })
}

fn watch_consumer(consumer: &ImageConsumer, index: usize, settled: &mpsc::UnboundedSender<Settled>) {
    let painted = settled.clone();
    consumer.on_status_change(move |change| {
        if change.current == Status::Painted {
            let _ = painted.send(Settled::Painted(index));
        }
    });
    let failed = settled.clone();
    consumer.on_failure(move |_, failure: &ConsumerFailure| {
        let _ = failed.send(Settled::Failed(index, failure.to_string()));
    });
}

fn spawn_progress_logger(
    mut events: broadcast::Receiver<ImageEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "progress events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &ImageEvent) {
    let url = event.payload.get("url").and_then(|v| v.as_str()).unwrap_or("-");
    match event.topic.as_str() {
        topics::STATUS_CHANGED => {
            tracing::info!(url, status = event.status().unwrap_or("-"), "image status");
        }
        topics::LOAD_FAILED | topics::PAINT_FAILED => {
            let error = event.payload.get("error").and_then(|v| v.as_str()).unwrap_or("-");
            tracing::warn!(url, error, topic = %event.topic, "image failed");
        }
        _ => tracing::debug!(topic = %event.topic, payload = %event.payload, "event"),
    }
}

/// Output file name for the `index`-th argument: `NNN-<stem>.png`.
pub(crate) fn output_name(index: usize, url: &str) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = last.rsplit_once('.').map_or(last, |(stem, _)| stem);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if cleaned.is_empty() { "image" } else { &cleaned };
    format!("{index:03}-{stem}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_are_ordered_and_sanitized() {
        assert_eq!(output_name(0, "https://x/a/hero.jpg"), "000-hero.png");
        assert_eq!(output_name(7, "https://x/a/b c.png?v=2#top"), "007-b_c.png");
        assert_eq!(output_name(12, "https://x/"), "012-x.png");
        assert_eq!(output_name(3, ""), "003-image.png");
        assert_eq!(output_name(1, "local/photo"), "001-photo.png");
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = ImageSettings::default();
        settings.coordinator.max_concurrency = Some(5);
        settings.coordinator.fetch_timeout_secs = Some(9);
        settings.coordinator.base_url = Some("https://cdn.test/".to_string());
        settings.output.dir = Some(PathBuf::from("from-settings"));

        let options = FetchOptions::resolve(
            FetchArgs {
                urls: vec!["a.png".to_string()],
                max_concurrency: Some(2),
                ..FetchArgs::default()
            },
            &settings,
        )
        .unwrap();

        assert_eq!(options.coordinator.max_concurrency, 2);
        assert_eq!(options.coordinator.fetch_timeout, Some(Duration::from_secs(9)));
        assert_eq!(options.out_dir, PathBuf::from("from-settings"));
        assert_eq!(
            options.coordinator.location.normalize("a.png").unwrap().as_str(),
            "https://cdn.test/a.png"
        );
    }

    #[test]
    fn defaults_apply_without_settings() {
        let options = FetchOptions::resolve(FetchArgs::default(), &ImageSettings::default()).unwrap();
        assert_eq!(options.coordinator.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(options.coordinator.fetch_timeout.is_none());
        assert_eq!(options.out_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(options.coordinator.location.href().is_some());
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        let result = FetchOptions::resolve(
            FetchArgs {
                base: Some("not a url".to_string()),
                ..FetchArgs::default()
            },
            &ImageSettings::default(),
        );
        assert!(result.is_err());
    }
}
