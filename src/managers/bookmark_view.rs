//! Derived view over the reconciled collection.
//!
//! Pure projection: filter by a search term, then order pinned first and newest
//! first within each group. Never mutates the underlying state.

use std::cmp::Reverse;

use crate::types::bookmark::BookmarkEntry;

/// Entries matching `search_term`, pinned first, then `created_at` descending.
///
/// Matching is a case-insensitive substring test against title, URL and tags.
/// A blank term matches everything. Ties keep collection order.
pub fn derive_view<'a>(entries: &'a [BookmarkEntry], search_term: &str) -> Vec<&'a BookmarkEntry> {
    let needle = search_term.trim().to_lowercase();

    let mut view: Vec<&BookmarkEntry> = entries
        .iter()
        .filter(|e| needle.is_empty() || e.bookmark.matches(&needle))
        .collect();

    view.sort_by_key(|e| (!e.bookmark.is_pinned, Reverse(e.bookmark.created_at)));
    view
}
