//! Unit tests for the linkshelf database layer (connection + migrations).

use linkshelf::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use linkshelf::database::Database;
use rusqlite::Connection;

fn columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
}

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_bookmarks_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let cols = columns(db.connection(), "bookmarks");

    for expected in [
        "id",
        "owner_id",
        "title",
        "url",
        "description",
        "image",
        "tags",
        "is_pinned",
        "created_at",
    ] {
        assert!(cols.iter().any(|c| c == expected), "column '{}' should exist", expected);
    }
}

#[test]
fn test_migrations_create_owner_index() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let exists: bool = db
        .connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name=?1",
            ["idx_bookmarks_owner_created"],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists, "owner index should exist after migrations");
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    // Running migrations a second time should not fail
    assert!(run_all(db.connection()).is_ok());
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_v1_database_is_upgraded_in_place() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL, description TEXT NOT NULL);
         INSERT INTO schema_version VALUES (1, 0, 'v1');
         CREATE TABLE bookmarks (
             id TEXT PRIMARY KEY, owner_id TEXT NOT NULL, title TEXT NOT NULL, url TEXT NOT NULL,
             description TEXT, image TEXT, created_at INTEGER NOT NULL
         );
         INSERT INTO bookmarks VALUES ('b1', 'u1', 'Old', 'https://old.com', NULL, NULL, 1000);",
    )
    .unwrap();

    run_all(&conn).unwrap();

    assert_eq!(get_schema_version(&conn), CURRENT_SCHEMA_VERSION);
    let (tags, pinned): (String, bool) = conn
        .query_row("SELECT tags, is_pinned FROM bookmarks WHERE id = 'b1'", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(tags, "[]");
    assert!(!pinned);
}

#[test]
fn test_schema_version_is_zero_without_table() {
    let conn = Connection::open_in_memory().unwrap();
    assert_eq!(get_schema_version(&conn), 0);
}
