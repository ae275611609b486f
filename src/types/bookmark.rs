use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::PageMetadata;

/// Prefix of the temporary id carried by a bookmark the store has not confirmed yet.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Represents a saved bookmark as seen by the current owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Returns `true` if this record still carries a temporary local id.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    /// Case-insensitive substring match against title, URL or any tag.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.url.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Generates a fresh temporary id for an optimistic record.
pub fn new_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// Insert payload handed to the remote store. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBookmark {
    pub owner_id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub is_pinned: bool,
}

/// Partial update of a stored bookmark. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

impl BookmarkPatch {
    pub fn pin(is_pinned: bool) -> Self {
        Self {
            is_pinned: Some(is_pinned),
            ..Self::default()
        }
    }

    /// Applies the patch in place.
    pub fn apply_to(&self, bookmark: &mut Bookmark) {
        if let Some(title) = &self.title {
            bookmark.title = title.clone();
        }
        if let Some(description) = &self.description {
            bookmark.description = Some(description.clone());
        }
        if let Some(image) = &self.image {
            bookmark.image = Some(image.clone());
        }
        if let Some(tags) = &self.tags {
            bookmark.tags = tags.clone();
        }
        if let Some(is_pinned) = self.is_pinned {
            bookmark.is_pinned = is_pinned;
        }
    }
}

/// Raw fields entered by the user in the add form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkDraft {
    pub title: String,
    pub url: String,
    /// Comma-separated tag input, e.g. `"rust, async ,,news"`.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl BookmarkDraft {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Fills the fields the user left empty from fetched page metadata.
    pub fn fill_from(&mut self, metadata: &PageMetadata) {
        if self.title.trim().is_empty() {
            if let Some(title) = &metadata.title {
                self.title = title.clone();
            }
        }
        if self.description.is_none() {
            self.description = metadata.description.clone();
        }
        if self.image.is_none() {
            self.image = metadata.image.clone();
        }
    }
}

/// Normalizes comma-separated tag input: trims, drops empties and repeated tags.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let tag = raw.trim();
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}

/// Marker attached to a locally mutated entry until the store answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    /// Optimistic insert waiting for the store to assign an id.
    Insert,
    /// Pin toggles sent but not yet acknowledged.
    PinToggle {
        in_flight: u32,
        /// Last `is_pinned` value the store is known to hold.
        confirmed: bool,
        /// Set once any toggle of the current burst failed.
        failed: bool,
    },
}

/// One row of the reconciled collection.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkEntry {
    pub bookmark: Bookmark,
    pub pending: Option<PendingOp>,
}

impl BookmarkEntry {
    pub fn confirmed(bookmark: Bookmark) -> Self {
        Self {
            bookmark,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
