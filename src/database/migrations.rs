//! Schema migrations for the linkshelf SQLite database.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use rusqlite::Connection;

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current schema version from the database (0 if table doesn't exist).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending schema migrations against the provided connection.
///
/// Safe to call on every startup.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Initial schema: bookmarks")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Add tags and is_pinned to bookmarks")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, now, description],
    )?;
    Ok(())
}

/// V1: bookmarks as the original dashboard stored them.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS bookmarks (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            description TEXT,
            image TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_bookmarks_owner_created
            ON bookmarks(owner_id, created_at DESC);
        ",
    )
}

/// V2: tags (JSON array) and pinning.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    let has_column = |name: &str| -> Result<bool, rusqlite::Error> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('bookmarks')")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for n in names {
            if n? == name {
                return Ok(true);
            }
        }
        Ok(false)
    };

    if !has_column("tags")? {
        conn.execute_batch("ALTER TABLE bookmarks ADD COLUMN tags TEXT NOT NULL DEFAULT '[]';")?;
    }
    if !has_column("is_pinned")? {
        conn.execute_batch(
            "ALTER TABLE bookmarks ADD COLUMN is_pinned INTEGER NOT NULL DEFAULT 0;",
        )?;
    }
    Ok(())
}
