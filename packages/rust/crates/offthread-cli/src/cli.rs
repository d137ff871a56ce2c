use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "offthread-img")]
#[command(about = "Fetch, decode and paint images off the calling thread.")]
pub(crate) struct Cli {
    /// Override config directory (reads `<DIR>/offthread-img/settings.yaml`).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch every URL and write it as PNG into the output directory.
    Fetch {
        /// Image URLs or local paths (duplicates share one fetch).
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output directory (default: settings `output.dir`, else `images`)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Base URL for relative arguments (default: current directory)
        #[arg(long)]
        base: Option<String>,

        /// Max concurrent fetch/decode pipelines (default: 3)
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Per-fetch timeout in seconds; 0 disables it
        #[arg(long)]
        fetch_timeout_secs: Option<u64>,

        /// Log at debug level
        #[arg(long, short)]
        verbose: bool,
    },
}
