//! Property-based tests for ShelfSettings serialization round-trip.
//!
//! These tests verify that ShelfSettings can be serialized to JSON, written
//! through the SettingsEngine and read back without data loss.

use linkshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use linkshelf::types::settings::{GeneralSettings, LoggingSettings, MetadataSettings, ShelfSettings};
use proptest::prelude::*;
use tempfile::TempDir;

// --- Arbitrary strategies for all settings sub-types ---

fn arb_general_settings() -> impl Strategy<Value = GeneralSettings> {
    proptest::option::of("/[a-z0-9_/]{1,30}\\.db")
        .prop_map(|database_path| GeneralSettings { database_path })
}

fn arb_metadata_settings() -> impl Strategy<Value = MetadataSettings> {
    (any::<bool>(), "[a-zA-Z0-9 ./();-]{1,60}", 1u64..=120).prop_map(
        |(enabled, user_agent, timeout_secs)| MetadataSettings {
            enabled,
            user_agent,
            timeout_secs,
        },
    )
}

fn arb_logging_settings() -> impl Strategy<Value = LoggingSettings> {
    (
        prop_oneof![
            Just("error".to_string()),
            Just("warn".to_string()),
            Just("info".to_string()),
            Just("debug".to_string()),
            Just("linkshelf=trace,info".to_string()),
        ],
        any::<bool>(),
    )
        .prop_map(|(level, json)| LoggingSettings { level, json })
}

fn arb_settings() -> impl Strategy<Value = ShelfSettings> {
    (arb_general_settings(), arb_metadata_settings(), arb_logging_settings()).prop_map(
        |(general, metadata, logging)| ShelfSettings {
            general,
            metadata,
            logging,
        },
    )
}

// **Settings JSON round-trip**
//
// *For any* valid settings, serializing to JSON and deserializing back
// SHALL produce an equal value.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn settings_json_roundtrip(settings in arb_settings()) {
        let json = serde_json::to_string_pretty(&settings)
            .expect("serialization should succeed");
        let back: ShelfSettings = serde_json::from_str(&json)
            .expect("deserialization should succeed");
        prop_assert_eq!(back, settings);
    }

    // *For any* valid settings, writing every leaf through `set_value` and
    // loading from disk in a fresh engine SHALL yield the same settings.
    #[test]
    fn settings_engine_persists_every_leaf(settings in arb_settings()) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();

        let mut engine = SettingsEngine::new(Some(path.clone()));
        engine.load().unwrap();
        engine.set_value("general.database_path", serde_json::json!(settings.general.database_path)).unwrap();
        engine.set_value("metadata.enabled", serde_json::json!(settings.metadata.enabled)).unwrap();
        engine.set_value("metadata.user_agent", serde_json::json!(settings.metadata.user_agent)).unwrap();
        engine.set_value("metadata.timeout_secs", serde_json::json!(settings.metadata.timeout_secs)).unwrap();
        engine.set_value("logging.level", serde_json::json!(settings.logging.level)).unwrap();
        engine.set_value("logging.json", serde_json::json!(settings.logging.json)).unwrap();

        let mut reread = SettingsEngine::new(Some(path));
        prop_assert_eq!(reread.load().unwrap(), settings);
    }
}
