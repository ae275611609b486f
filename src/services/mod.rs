// Linkshelf services
// Services talk to the outside world: the remote store, page metadata, settings on disk.

pub mod metadata_fetcher;
pub mod remote_store;
pub mod settings_engine;
