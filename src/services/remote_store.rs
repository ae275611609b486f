//! Remote store contract for linkshelf.
//!
//! [`RemoteStore`] is what the reconciler consumes: owner-scoped CRUD plus a
//! realtime change subscription. [`ChangeFeed`] is the in-process fan-out used
//! by store implementations to deliver change events, and [`SqliteRemoteStore`]
//! is a reference store backed by SQLite via `rusqlite`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::database::Database;
use crate::types::bookmark::{Bookmark, BookmarkPatch, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::event::{ChangeEvent, BOOKMARKS_TABLE};
use crate::types::session::SessionContext;

/// Trait defining the remote store operations the reconciler relies on.
///
/// Implementations enforce owner scoping themselves; callers never filter rows.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All bookmarks of the session's owner, newest first.
    async fn list(&self, session: &SessionContext) -> Result<Vec<Bookmark>, StoreError>;
    /// Inserts a record and returns it with its assigned `id` and `created_at`.
    async fn insert(&self, session: &SessionContext, record: NewBookmark) -> Result<Bookmark, StoreError>;
    async fn update(&self, session: &SessionContext, id: &str, patch: BookmarkPatch) -> Result<(), StoreError>;
    async fn delete(&self, session: &SessionContext, id: &str) -> Result<(), StoreError>;
    /// Opens a realtime subscription on the bookmarks table for the session's owner.
    fn subscribe(&self, session: &SessionContext) -> Result<Subscription, StoreError>;
}

// ─── Change feed ───

struct Subscriber {
    owner_id: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl FeedInner {
    fn remove(&self, id: u64) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.remove(&id);
    }
}

/// Per-owner fan-out of change events to live subscriptions.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for `owner_id`. The returned handle unsubscribes on drop.
    pub fn subscribe(&self, owner_id: &str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id,
                Subscriber {
                    owner_id: owner_id.to_string(),
                    tx,
                },
            );
        tracing::debug!(subscription = id, owner = owner_id, "subscriber registered");
        Subscription {
            id,
            events: rx,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to every subscriber of `owner_id`. Returns how many received it.
    pub fn publish(&self, owner_id: &str, event: ChangeEvent) -> usize {
        let mut subs = self.inner.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        subs.retain(|_, sub| {
            if sub.owner_id != owner_id {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Handle to a live realtime subscription.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) removes it from the feed.
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    feed: Weak<FeedInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn table(&self) -> &'static str {
        BOOKMARKS_TABLE
    }

    /// Waits for the next event. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.feed.upgrade() {
            inner.remove(self.id);
            tracing::debug!(subscription = self.id, "subscriber removed");
        }
    }
}

// ─── SQLite store ───

/// Raw column values of a `bookmarks` row.
struct BookmarkRow {
    id: String,
    owner_id: String,
    title: String,
    url: String,
    description: Option<String>,
    image: Option<String>,
    tags: String,
    is_pinned: bool,
    created_at: i64,
}

impl BookmarkRow {
    const COLUMNS: &'static str =
        "id, owner_id, title, url, description, image, tags, is_pinned, created_at";

    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            description: row.get(4)?,
            image: row.get(5)?,
            tags: row.get(6)?,
            is_pinned: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_domain(self) -> Result<Bookmark, StoreError> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| StoreError::MalformedRow(format!("tags of {}: {}", self.id, e)))?;
        let created_at = Utc
            .timestamp_millis_opt(self.created_at)
            .single()
            .ok_or_else(|| StoreError::MalformedRow(format!("created_at of {}", self.id)))?;
        Ok(Bookmark {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            url: self.url,
            description: self.description,
            image: self.image,
            tags,
            is_pinned: self.is_pinned,
            created_at,
        })
    }
}

/// Reference [`RemoteStore`] backed by a SQLite database.
///
/// Assigns UUID ids and strictly increasing `created_at` timestamps, scopes every
/// query to the session's owner and publishes a change event after each write.
pub struct SqliteRemoteStore {
    db: Mutex<Database>,
    feed: ChangeFeed,
}

impl SqliteRemoteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            feed: ChangeFeed::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// The feed this store publishes to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn authorize(session: &SessionContext) -> Result<(), StoreError> {
        if session.is_valid() {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied("invalid or expired session".to_string()))
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        f(db.connection())
    }

    fn fetch_row(conn: &Connection, owner_id: &str, id: &str) -> Result<Option<Bookmark>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookmarks WHERE id = ?1 AND owner_id = ?2",
            BookmarkRow::COLUMNS
        );
        let row = conn
            .query_row(&sql, params![id, owner_id], BookmarkRow::read)
            .optional()?;
        row.map(BookmarkRow::into_domain).transpose()
    }

    /// Next creation timestamp in milliseconds, never equal to an earlier one.
    fn next_created_at(conn: &Connection) -> Result<DateTime<Utc>, StoreError> {
        let last: Option<i64> =
            conn.query_row("SELECT MAX(created_at) FROM bookmarks", [], |row| row.get(0))?;
        let now = Utc::now().timestamp_millis();
        let millis = match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| StoreError::DatabaseError(format!("timestamp out of range: {}", millis)))
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn list(&self, session: &SessionContext) -> Result<Vec<Bookmark>, StoreError> {
        Self::authorize(session)?;
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bookmarks WHERE owner_id = ?1 ORDER BY created_at DESC, id",
                BookmarkRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![session.owner_id], BookmarkRow::read)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?.into_domain()?);
            }
            Ok(results)
        })
    }

    async fn insert(&self, session: &SessionContext, record: NewBookmark) -> Result<Bookmark, StoreError> {
        Self::authorize(session)?;
        if record.owner_id != session.owner_id {
            return Err(StoreError::PermissionDenied(format!(
                "cannot insert on behalf of {}",
                record.owner_id
            )));
        }

        let bookmark = self.with_conn(|conn| {
            let created_at = Self::next_created_at(conn)?;
            let bookmark = Bookmark {
                id: Uuid::new_v4().to_string(),
                owner_id: record.owner_id,
                title: record.title,
                url: record.url,
                description: record.description,
                image: record.image,
                tags: record.tags,
                is_pinned: record.is_pinned,
                created_at,
            };
            let tags = serde_json::to_string(&bookmark.tags)
                .map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            conn.execute(
                "INSERT INTO bookmarks (id, owner_id, title, url, description, image, tags, is_pinned, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    bookmark.id,
                    bookmark.owner_id,
                    bookmark.title,
                    bookmark.url,
                    bookmark.description,
                    bookmark.image,
                    tags,
                    bookmark.is_pinned,
                    bookmark.created_at.timestamp_millis(),
                ],
            )?;
            Ok(bookmark)
        })?;

        tracing::debug!(id = %bookmark.id, owner = %bookmark.owner_id, "row inserted");
        self.feed
            .publish(&session.owner_id, ChangeEvent::Insert(bookmark.clone()));
        Ok(bookmark)
    }

    async fn update(&self, session: &SessionContext, id: &str, patch: BookmarkPatch) -> Result<(), StoreError> {
        Self::authorize(session)?;

        let updated = self.with_conn(|conn| {
            let mut bookmark = Self::fetch_row(conn, &session.owner_id, id)?
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply_to(&mut bookmark);
            let tags = serde_json::to_string(&bookmark.tags)
                .map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            conn.execute(
                "UPDATE bookmarks SET title = ?1, description = ?2, image = ?3, tags = ?4, is_pinned = ?5 \
                 WHERE id = ?6 AND owner_id = ?7",
                params![
                    bookmark.title,
                    bookmark.description,
                    bookmark.image,
                    tags,
                    bookmark.is_pinned,
                    id,
                    session.owner_id,
                ],
            )?;
            Ok(bookmark)
        })?;

        tracing::debug!(id, "row updated");
        self.feed
            .publish(&session.owner_id, ChangeEvent::Update(updated));
        Ok(())
    }

    async fn delete(&self, session: &SessionContext, id: &str) -> Result<(), StoreError> {
        Self::authorize(session)?;

        let affected = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND owner_id = ?2",
                params![id, session.owner_id],
            )?)
        })?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        tracing::debug!(id, "row deleted");
        self.feed.publish(
            &session.owner_id,
            ChangeEvent::Delete { id: id.to_string() },
        );
        Ok(())
    }

    fn subscribe(&self, session: &SessionContext) -> Result<Subscription, StoreError> {
        Self::authorize(session)?;
        Ok(self.feed.subscribe(&session.owner_id))
    }
}
