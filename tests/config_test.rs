//! Configuration files and logging setup.

use pipeflow::{init_logging, FlowConfig, LoggingConfig};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.toml");

    let mut config = FlowConfig::default();
    config.engine.max_operations = 5_000;
    config.logging.ansi = false;
    config.save(&path).unwrap();

    let loaded = FlowConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_relative_script_dir_follows_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.toml");
    std::fs::write(&path, "script_dir = \"scripts\"\n").unwrap();

    let config = FlowConfig::load(&path).unwrap();
    assert_eq!(config.script_dir, Some(dir.path().join("scripts")));
}

#[test]
fn test_absolute_script_dir_kept() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.toml");
    let scripts = dir.path().join("elsewhere");
    let config = FlowConfig {
        script_dir: Some(scripts.clone()),
        ..FlowConfig::default()
    };
    config.save(&path).unwrap();

    assert_eq!(FlowConfig::load(&path).unwrap().script_dir, Some(scripts));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing: PathBuf = dir.path().join("missing.toml");

    assert!(FlowConfig::load(&missing).is_err());
    assert_eq!(FlowConfig::load_or_default(&missing), FlowConfig::default());
}

#[test]
#[serial]
fn test_init_logging_writes_file() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    let config = LoggingConfig {
        filter: "debug".to_string(),
        ansi: false,
        directory: Some(logs.clone()),
        ..LoggingConfig::default()
    };

    let guard = init_logging(&config).unwrap();
    assert!(guard.is_some());
    tracing::info!("logging installed");

    // The global subscriber can only be installed once per process
    assert!(init_logging(&LoggingConfig::default()).is_err());
    drop(guard);

    let files: Vec<_> = std::fs::read_dir(&logs)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(&config.file_prefix)
        })
        .collect();
    assert_eq!(files.len(), 1);
}
