//! offthread-img command-line front end.
//!
//! Settings loading and the `fetch` command live here so they can be tested
//! without spawning the binary.

mod run;
mod settings;

pub use run::{FetchArgs, FetchOptions, FetchSummary, ImageReport, run_fetch};
pub use settings::{
    CoordinatorSettings, DecoderSettings, FetcherSettings, ImageSettings, OutputSettings,
    load_settings, load_settings_from_paths, set_config_home_override, settings_paths,
};
