//! Reconciled bookmark collection.
//!
//! [`BookmarkState`] is the single-writer store of "what the current owner sees".
//! Every mutation is a plain synchronous method, so the merge rules can be
//! tested without a runtime or a remote store:
//!
//! - realtime `Insert` is ignored when the id is already present or already gone,
//!   otherwise prepended
//! - realtime `Update` replaces an existing row wholesale, otherwise is ignored
//! - realtime `Delete` removes the row if present and remembers the id as gone
//! - a confirmed insert takes its placeholder's slot and absorbs any copy of the
//!   same id that the realtime channel delivered first, unless that id is gone
//!
//! An id is gone once a realtime `Delete` named it or a local delete of it was
//! confirmed, and while a local delete of it is in flight. Store ids are never
//! reused. Only the most recent [`TOMBSTONE_LIMIT`] gone ids are remembered.
//!
//! These rules make the outcome independent of whether a write's confirmation or
//! its realtime echo is applied first, and make redelivered events no-ops.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::bookmark::{Bookmark, BookmarkEntry, PendingOp};
use crate::types::errors::BookmarkError;
use crate::types::event::ChangeEvent;

/// What applying a realtime event did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeEffect {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

/// How many deleted ids are remembered to reject late inserts.
pub const TOMBSTONE_LIMIT: usize = 1024;

/// Ordered collection of bookmark entries, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct BookmarkState {
    entries: Vec<BookmarkEntry>,
    /// Ids removed locally whose remote delete has not answered yet, with a count.
    pending_deletes: HashMap<String, u32>,
    /// Ids known to be deleted from the store.
    tombstones: HashSet<String>,
    /// Burial order of `tombstones`, oldest first.
    burial_order: VecDeque<String>,
}

impl BookmarkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    pub fn bookmarks(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter().map(|e| &e.bookmark)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BookmarkEntry> {
        self.entries.iter().find(|e| e.bookmark.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.bookmark.id == id)
    }

    /// Whether a late insert of `id` must not bring the row back.
    pub fn is_gone(&self, id: &str) -> bool {
        self.tombstones.contains(id) || self.pending_deletes.contains_key(id)
    }

    /// Number of local writes still waiting for the store.
    pub fn pending_count(&self) -> usize {
        let marked: usize = self
            .entries
            .iter()
            .map(|e| match e.pending {
                Some(PendingOp::Insert) => 1,
                Some(PendingOp::PinToggle { in_flight, .. }) => in_flight as usize,
                None => 0,
            })
            .sum();
        marked + self.pending_deletes.values().map(|n| *n as usize).sum::<usize>()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending_deletes.clear();
        self.tombstones.clear();
        self.burial_order.clear();
    }

    /// Number of deleted ids currently remembered.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    fn bury(&mut self, id: String) {
        if !self.tombstones.insert(id.clone()) {
            return;
        }
        self.burial_order.push_back(id);
        while self.burial_order.len() > TOMBSTONE_LIMIT {
            if let Some(oldest) = self.burial_order.pop_front() {
                self.tombstones.remove(&oldest);
            }
        }
    }

    fn exhume(&mut self, id: &str) {
        if self.tombstones.remove(id) {
            self.burial_order.retain(|t| t != id);
        }
    }

    /// Replaces the confirmed rows with `rows`, keeping placeholders of in-flight inserts.
    ///
    /// Rows with a local delete still in flight stay hidden; the fetch may have
    /// run before the delete reached the store.
    ///
    /// A fetched row with pin toggles still in flight keeps its marker and the
    /// optimistic `is_pinned`; the fetched value becomes the known store value.
    pub fn replace_all(&mut self, rows: Vec<Bookmark>) {
        let mut pins: HashMap<String, (PendingOp, bool)> = HashMap::new();
        let mut entries: Vec<BookmarkEntry> = Vec::new();
        for entry in self.entries.drain(..) {
            match entry.pending {
                Some(PendingOp::Insert) => entries.push(entry),
                Some(op @ PendingOp::PinToggle { .. }) => {
                    pins.insert(entry.bookmark.id, (op, entry.bookmark.is_pinned));
                }
                None => {}
            }
        }

        for mut row in rows {
            if entries.iter().any(|e| e.bookmark.id == row.id) {
                tracing::warn!(id = %row.id, "duplicate id in fetched rows, keeping the first");
                continue;
            }
            if self.pending_deletes.contains_key(&row.id) {
                tracing::debug!(id = %row.id, "fetched row has a delete in flight, keeping it hidden");
                continue;
            }
            self.exhume(&row.id);
            let pending = match pins.remove(&row.id) {
                Some((PendingOp::PinToggle { in_flight, failed, .. }, optimistic)) => {
                    let confirmed = row.is_pinned;
                    row.is_pinned = optimistic;
                    Some(PendingOp::PinToggle {
                        in_flight,
                        confirmed,
                        failed,
                    })
                }
                _ => None,
            };
            entries.push(BookmarkEntry { bookmark: row, pending });
        }
        self.entries = entries;
    }

    // ─── Realtime merge ───

    /// Applies one realtime change event.
    pub fn apply_event(&mut self, event: ChangeEvent) -> MergeEffect {
        match event {
            ChangeEvent::Insert(row) => {
                if self.contains(&row.id) || self.is_gone(&row.id) {
                    MergeEffect::Ignored
                } else {
                    self.entries.insert(0, BookmarkEntry::confirmed(row));
                    MergeEffect::Inserted
                }
            }
            ChangeEvent::Update(row) => match self.position(&row.id) {
                Some(idx) => {
                    self.entries[idx].bookmark = row;
                    MergeEffect::Replaced
                }
                None => MergeEffect::Ignored,
            },
            ChangeEvent::Delete { id } => {
                let effect = match self.position(&id) {
                    Some(idx) => {
                        self.entries.remove(idx);
                        MergeEffect::Removed
                    }
                    None => MergeEffect::Ignored,
                };
                self.bury(id);
                effect
            }
        }
    }

    // ─── Optimistic insert ───

    /// Prepends an unconfirmed record carrying a temporary id.
    pub fn insert_placeholder(&mut self, bookmark: Bookmark) {
        self.entries.insert(
            0,
            BookmarkEntry {
                bookmark,
                pending: Some(PendingOp::Insert),
            },
        );
    }

    /// Swaps the placeholder `local_id` for the store-confirmed `record`.
    ///
    /// When the realtime channel already delivered `record.id`, that copy is
    /// removed and its content (at least as new as `record`) moves into the
    /// placeholder's slot. Without a placeholder (e.g. dropped by a reload that
    /// raced the insert) the record is merged like a realtime insert. A record
    /// whose id is already gone only drops the placeholder.
    pub fn confirm_insert(&mut self, local_id: &str, record: Bookmark) -> Bookmark {
        if self.is_gone(&record.id) {
            self.fail_insert(local_id);
            if let Some(idx) = self.position(&record.id) {
                self.entries.remove(idx);
            }
            return record;
        }
        let existing = self.position(&record.id);
        let Some(mut slot) = self.position(local_id) else {
            if existing.is_none() {
                self.entries.insert(0, BookmarkEntry::confirmed(record.clone()));
            }
            return self.get(&record.id).map(|e| e.bookmark.clone()).unwrap_or(record);
        };

        let content = match existing {
            Some(idx) => {
                let copy = self.entries.remove(idx);
                if idx < slot {
                    slot -= 1;
                }
                copy.bookmark
            }
            None => record,
        };

        self.entries[slot] = BookmarkEntry::confirmed(content.clone());
        content
    }

    /// Drops the placeholder of a failed insert.
    pub fn fail_insert(&mut self, local_id: &str) -> Option<Bookmark> {
        let idx = self.position(local_id)?;
        Some(self.entries.remove(idx).bookmark)
    }

    // ─── Optimistic delete ───

    /// Removes a confirmed bookmark ahead of the remote delete.
    pub fn remove_optimistic(&mut self, id: &str) -> Result<Bookmark, BookmarkError> {
        let idx = self
            .position(id)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        if self.entries[idx].pending == Some(PendingOp::Insert) {
            return Err(BookmarkError::NotConfirmed(id.to_string()));
        }
        let removed = self.entries.remove(idx).bookmark;
        *self.pending_deletes.entry(id.to_string()).or_insert(0) += 1;
        Ok(removed)
    }

    /// Clears the in-flight marker of a delete, whatever its result.
    pub fn settle_delete(&mut self, id: &str) {
        if let Some(count) = self.pending_deletes.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.pending_deletes.remove(id);
            }
        }
    }

    /// Records a delete the store accepted, dropping any copy a reload or a
    /// late event brought back in the meantime.
    pub fn confirm_delete(&mut self, id: &str) {
        if let Some(idx) = self.position(id) {
            self.entries.remove(idx);
        }
        self.bury(id.to_string());
    }

    pub fn is_delete_pending(&self, id: &str) -> bool {
        self.pending_deletes.contains_key(id)
    }

    // ─── Optimistic pin toggle ───

    /// Flips `is_pinned` locally. Returns the value before the flip.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool, BookmarkError> {
        let idx = self
            .position(id)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        let entry = &mut self.entries[idx];
        let (in_flight, confirmed, failed) = match entry.pending {
            Some(PendingOp::Insert) => return Err(BookmarkError::NotConfirmed(id.to_string())),
            Some(PendingOp::PinToggle {
                in_flight,
                confirmed,
                failed,
            }) => (in_flight, confirmed, failed),
            None => (0, entry.bookmark.is_pinned, false),
        };

        let previous = entry.bookmark.is_pinned;
        entry.bookmark.is_pinned = !previous;
        entry.pending = Some(PendingOp::PinToggle {
            in_flight: in_flight + 1,
            confirmed,
            failed,
        });
        Ok(previous)
    }

    /// Settles one pin toggle that flipped the value away from `previous`.
    ///
    /// Overlapping toggles on one row form a burst. When the last of them
    /// settles and any of them failed, `is_pinned` is restored to the last value
    /// the store accepted (the value before the burst if none succeeded).
    /// Returns `true` if that restore changed `is_pinned`. Entries without a
    /// pin marker are left alone.
    pub fn settle_pin(&mut self, id: &str, previous: bool, succeeded: bool) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        let Some(PendingOp::PinToggle {
            in_flight,
            mut confirmed,
            mut failed,
        }) = entry.pending
        else {
            return false;
        };

        if succeeded {
            confirmed = !previous;
        } else {
            failed = true;
        }

        if in_flight > 1 {
            entry.pending = Some(PendingOp::PinToggle {
                in_flight: in_flight - 1,
                confirmed,
                failed,
            });
            return false;
        }

        entry.pending = None;
        if failed && entry.bookmark.is_pinned != confirmed {
            entry.bookmark.is_pinned = confirmed;
            true
        } else {
            false
        }
    }
}
