use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// Name of the table every change event refers to.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

/// Kind of committed change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change pushed by the remote store's realtime channel.
///
/// Delivery is at-least-once and only approximately ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete { id: String },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the row the event describes.
    pub fn row_id(&self) -> &str {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => &row.id,
            ChangeEvent::Delete { id } => id,
        }
    }
}
