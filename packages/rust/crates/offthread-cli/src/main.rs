//! offthread-img CLI: fetch images concurrently and write them as PNG.
//!
//! Logging: set `RUST_LOG=offthread_img=debug` (or `warn`, `info`) to see
//! coordinator logs on stderr.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use offthread_cli::{FetchArgs, FetchOptions, load_settings, run_fetch, set_config_home_override};

use crate::cli::{Cli, Command};

const DEFAULT_FILTER: &str = "offthread_img=info,offthread_io=info,offthread_cli=info";
const VERBOSE_FILTER: &str = "offthread_img=debug,offthread_io=debug,offthread_cli=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let verbose = matches!(&cli.command, Command::Fetch { verbose: true, .. });
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let settings = load_settings();

    match cli.command {
        Command::Fetch {
            urls,
            out,
            base,
            max_concurrency,
            fetch_timeout_secs,
            verbose: _,
        } => {
            let options = FetchOptions::resolve(
                FetchArgs {
                    urls,
                    out_dir: out,
                    base,
                    max_concurrency,
                    fetch_timeout_secs,
                },
                &settings,
            )?;
            let summary = run_fetch(options).await?;
            for report in &summary.reports {
                match &report.result {
                    Ok(()) => println!("ok    {} -> {}", report.url, report.target.display()),
                    Err(error) => println!("fail  {}: {error}", report.url),
                }
            }
            println!(
                "{} painted, {} failed",
                summary.painted(),
                summary.failed()
            );
            if summary.failed() > 0 {
                anyhow::bail!("{} of {} images failed", summary.failed(), summary.reports.len());
            }
            Ok(())
        }
    }
}
