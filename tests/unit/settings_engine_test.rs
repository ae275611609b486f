//! Integration-level unit tests for the SettingsEngine public API.
//!
//! These tests exercise the SettingsEngine through its public trait interface,
//! validating default loading, value persistence, key validation and reset.

use linkshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use linkshelf::types::errors::SettingsError;
use linkshelf::types::settings::ShelfSettings;
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

/// When no config file exists on disk, `load()` must return the built-in
/// defaults so the shelf can start with sensible values.
#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, ShelfSettings::default());
    assert!(settings.metadata.enabled);
    assert_eq!(settings.metadata.timeout_secs, 10);
    assert_eq!(settings.logging.level, "info");
}

/// After calling `set_value`, a new engine reading the same file sees the update.
#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value("metadata.timeout_secs", serde_json::json!(3))
            .unwrap();
        engine
            .set_value("general.database_path", serde_json::json!("/tmp/shelf.db"))
            .unwrap();
    }

    {
        let mut engine2 = engine_in_temp(&dir);
        let loaded = engine2.load().unwrap();
        assert_eq!(loaded.metadata.timeout_secs, 3);
        assert_eq!(loaded.general.database_path.as_deref(), Some("/tmp/shelf.db"));
    }
}

#[test]
fn test_set_value_rejects_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let err = engine.set_value("metadata.colour", serde_json::json!("red"));
    assert!(matches!(err, Err(SettingsError::InvalidKey(_))));
    let err = engine.set_value("nope.level", serde_json::json!("debug"));
    assert!(matches!(err, Err(SettingsError::InvalidKey(_))));
    let err = engine.set_value("", serde_json::json!(1));
    assert!(matches!(err, Err(SettingsError::InvalidKey(_))));
}

#[test]
fn test_set_value_rejects_wrong_type() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let err = engine.set_value("metadata.timeout_secs", serde_json::json!("soon"));
    assert!(matches!(err, Err(SettingsError::InvalidValue(_))));
    assert_eq!(engine.get_settings().metadata.timeout_secs, 10);
}

#[test]
fn test_malformed_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
    let mut engine = engine_in_temp(&dir);

    assert!(matches!(engine.load(), Err(SettingsError::SerializationError(_))));
    assert_eq!(*engine.get_settings(), ShelfSettings::default());
}

/// After modifying settings and calling `reset()`, all values revert to
/// defaults and the defaults are persisted to disk.
#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();

        engine
            .set_value("logging.level", serde_json::json!("debug"))
            .unwrap();
        engine.set_value("logging.json", serde_json::json!(true)).unwrap();
        assert_eq!(engine.get_settings().logging.level, "debug");
        assert!(engine.get_settings().logging.json);

        engine.reset().unwrap();
        assert_eq!(*engine.get_settings(), ShelfSettings::default());
    }

    {
        let mut engine2 = engine_in_temp(&dir);
        let loaded = engine2.load().unwrap();
        assert_eq!(loaded, ShelfSettings::default());
    }
}
