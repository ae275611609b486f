//! App Core for linkshelf.
//!
//! Wires the settings, the reference store, the metadata fetcher and the
//! bookmark manager together for the binaries.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::managers::bookmark_manager::BookmarkManager;
use crate::platform;
use crate::rpc_handler::handle_method;
use crate::services::metadata_fetcher::{MetadataFetcher, NoopMetadataFetcher};
use crate::services::remote_store::SqliteRemoteStore;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::settings::{MetadataSettings, ShelfSettings};

/// Central application struct holding the manager and the services it talks to.
pub struct App {
    pub settings_engine: SettingsEngine,
    pub store: Arc<SqliteRemoteStore>,
    pub manager: BookmarkManager<SqliteRemoteStore>,
    pub fetcher: Box<dyn MetadataFetcher>,
}

impl App {
    /// Opens the store at `db_path` and builds the fetcher from the loaded settings.
    pub fn new(db_path: &str, settings_engine: SettingsEngine) -> Result<Self, Box<dyn std::error::Error>> {
        let fetcher = build_fetcher(&settings_engine.get_settings().metadata);
        Self::with_fetcher(db_path, settings_engine, fetcher)
    }

    pub fn with_fetcher(
        db_path: &str,
        settings_engine: SettingsEngine,
        fetcher: Box<dyn MetadataFetcher>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(
            SqliteRemoteStore::open(db_path).map_err(|e| format!("Store init failed: {}", e))?,
        );
        let manager = BookmarkManager::new(Arc::clone(&store));
        Ok(Self {
            settings_engine,
            store,
            manager,
            fetcher,
        })
    }

    pub fn settings(&self) -> &ShelfSettings {
        self.settings_engine.get_settings()
    }

    /// Dispatches one command through [`handle_method`].
    pub async fn handle(&mut self, method: &str, params: &Value) -> Result<Value, String> {
        handle_method(&mut self.manager, self.fetcher.as_ref(), method, params).await
    }

    /// Signs out, closing the realtime subscription.
    pub fn shutdown(&mut self) {
        self.manager.sign_out();
        tracing::info!("linkshelf shut down");
    }
}

/// SQLite file used by the reference store.
///
/// `LINKSHELF_DATA_DIR` wins, then `general.database_path`, then the platform data dir.
pub fn resolve_database_path(settings: &ShelfSettings) -> PathBuf {
    if let Ok(dir) = std::env::var("LINKSHELF_DATA_DIR") {
        return PathBuf::from(dir).join("linkshelf.db");
    }
    match &settings.general.database_path {
        Some(path) => PathBuf::from(path),
        None => platform::get_data_dir().join("linkshelf.db"),
    }
}

/// HTTP fetcher when enabled and compiled in, otherwise the no-op one.
pub fn build_fetcher(settings: &MetadataSettings) -> Box<dyn MetadataFetcher> {
    #[cfg(feature = "network")]
    {
        use crate::services::metadata_fetcher::HttpMetadataFetcher;
        if settings.enabled {
            match HttpMetadataFetcher::new(settings) {
                Ok(fetcher) => return Box::new(fetcher),
                Err(e) => tracing::warn!(error = %e, "metadata fetcher unavailable"),
            }
        }
    }
    #[cfg(not(feature = "network"))]
    let _ = settings;
    Box::new(NoopMetadataFetcher)
}
