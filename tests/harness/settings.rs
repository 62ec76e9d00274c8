//! Harnesses configured from a settings file.

use crate::common::*;
use seedbed::{forget_server, ConsistencyPolicy, HarnessSettings, SETTINGS_FILE_NAME};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn settings_file_configures_harness() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);
    let url = unique_url("settings");
    std::fs::write(
        &path,
        format!(
            "url = \"{}\"\ntenant = \"FromFile\"\nconsistency = \"allow\"\nserver_errors_as_warnings = true\nstale_index_timeout_ms = 1500\n",
            url
        ),
    )
    .unwrap();

    let harness = TestStore::from_settings(&path).unwrap();
    let config = harness.config();

    assert_eq!(config.consistency, ConsistencyPolicy::AllowStaleResults);
    assert!(config.server_errors_as_warnings);
    assert_eq!(config.stale_index_timeout, Duration::from_millis(1500));
    assert_eq!(harness.document_store().unwrap().tenant(), "FromFile");

    harness.close().unwrap();
    forget_server(&url);
}

#[test]
fn default_settings_file_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);

    HarnessSettings::write_default_if_missing(&path).unwrap();
    let harness = TestStore::from_settings(&path).unwrap();

    assert_eq!(
        harness.config().consistency,
        ConsistencyPolicy::WaitForNonStaleResults
    );
}

#[test]
fn invalid_settings_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);
    std::fs::write(&path, "consistency = 42\n").unwrap();

    assert!(matches!(
        TestStore::from_settings(&path),
        Err(HarnessError::InvalidSettings { .. })
    ));
}

#[test]
fn missing_settings_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        TestStore::from_settings(&dir.path().join("absent.toml")),
        Err(HarnessError::InvalidSettings { .. })
    ));
}

#[test]
fn blank_url_in_settings_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);
    std::fs::write(&path, "url = \"\"\ntenant = \"Integration\"\n").unwrap();

    assert!(matches!(
        TestStore::from_settings(&path),
        Err(HarnessError::InvalidSettings { .. })
    ));
}
