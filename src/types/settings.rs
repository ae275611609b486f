use serde::{Deserialize, Serialize};

/// Top-level linkshelf settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShelfSettings {
    pub general: GeneralSettings,
    pub metadata: MetadataSettings,
    pub logging: LoggingSettings,
}

/// General settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneralSettings {
    /// SQLite file backing the reference store. `None` uses the platform data dir.
    #[serde(default)]
    pub database_path: Option<String>,
}

/// Metadata fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataSettings {
    pub enabled: bool,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: "Mozilla/5.0 (compatible; LinkshelfBot/1.0)".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
