#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use offthread_cli::load_settings_from_paths;
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write yaml");
}

#[test]
fn merge_user_overrides_system() {
    let tmp = TempDir::new().expect("tempdir");
    let system = tmp.path().join("packages/conf/settings.yaml");
    let user = tmp.path().join(".config/offthread-img/settings.yaml");

    write_file(
        &system,
        r"
coordinator:
  max_concurrency: 3
  fetch_timeout_secs: 20
  base_url: https://cdn.example.com/
fetcher:
  max_bytes: 1048576
  timeout_secs: 30
decoder:
  max_dimension: 4096
output:
  dir: images
",
    );
    write_file(
        &user,
        r"
coordinator:
  max_concurrency: 8
fetcher:
  user_agent: custom-agent/1.0
output:
  dir: /tmp/painted
",
    );

    let settings = load_settings_from_paths(&system, &user);

    assert_eq!(settings.coordinator.max_concurrency, Some(8));
    assert_eq!(settings.coordinator.fetch_timeout_secs, Some(20));
    assert_eq!(
        settings.coordinator.base_url.as_deref(),
        Some("https://cdn.example.com/")
    );
    assert_eq!(settings.fetcher.max_bytes, Some(1_048_576));
    assert_eq!(settings.fetcher.timeout_secs, Some(30));
    assert_eq!(settings.fetcher.user_agent.as_deref(), Some("custom-agent/1.0"));
    assert_eq!(settings.decoder.max_dimension, Some(4096));
    assert_eq!(settings.output.dir, Some(PathBuf::from("/tmp/painted")));
}

#[test]
fn missing_files_yield_defaults() {
    let tmp = TempDir::new().expect("tempdir");
    let settings = load_settings_from_paths(
        &tmp.path().join("nope/system.yaml"),
        &tmp.path().join("nope/user.yaml"),
    );
    assert!(settings.coordinator.max_concurrency.is_none());
    assert!(settings.output.dir.is_none());
}

#[test]
fn malformed_user_file_is_ignored() {
    let tmp = TempDir::new().expect("tempdir");
    let system = tmp.path().join("system.yaml");
    let user = tmp.path().join("user.yaml");
    write_file(&system, "coordinator:\n  max_concurrency: 4\n");
    write_file(&user, "coordinator: [this is: not valid\n");

    let settings = load_settings_from_paths(&system, &user);

    assert_eq!(settings.coordinator.max_concurrency, Some(4));
}

#[test]
fn empty_file_is_treated_as_no_settings() {
    let tmp = TempDir::new().expect("tempdir");
    let system = tmp.path().join("system.yaml");
    let user = tmp.path().join("user.yaml");
    write_file(&system, "decoder:\n  max_dimension: 512\n");
    write_file(&user, "");

    let settings = load_settings_from_paths(&system, &user);

    assert_eq!(settings.decoder.max_dimension, Some(512));
}
