//! Linkshelf database layer.
//!
//! SQLite connection management and schema migrations for the reference
//! [`SqliteRemoteStore`](crate::services::remote_store::SqliteRemoteStore).
//!
//! # Usage
//!
//! ```no_run
//! use linkshelf::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("linkshelf.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
