//! Property-based tests for bookmark reconciliation.
//!
//! These tests verify, for arbitrary operation sequences, that the reconciled
//! collection never holds two records with the same id, that redelivered
//! realtime events change nothing, that an insert's confirmation and its
//! realtime echo converge in either order, that a deleted id never comes
//! back, and that once every write has settled the collection matches the store.

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{bookmark, session, ScriptedStore, OWNER};
use linkshelf::managers::bookmark_manager::BookmarkManager;
use linkshelf::managers::bookmark_state::BookmarkState;
use linkshelf::services::remote_store::RemoteStore;
use linkshelf::types::bookmark::{new_local_id, BookmarkDraft, NewBookmark};
use linkshelf::types::event::ChangeEvent;
use proptest::prelude::*;

/// Strategy for realtime events over a small id pool, so collisions are common.
fn arb_event() -> impl Strategy<Value = ChangeEvent> {
    let id = prop_oneof![Just("a"), Just("b"), Just("c"), Just("d")];
    (0u8..3, id, "[A-Z][a-z]{1,6}", 1i64..50, any::<bool>()).prop_map(
        |(kind, id, title, at, pinned)| match kind {
            0 => ChangeEvent::Insert(bookmark(id, &title, at, pinned)),
            1 => ChangeEvent::Update(bookmark(id, &title, at, pinned)),
            _ => ChangeEvent::Delete { id: id.to_string() },
        },
    )
}

fn snapshot(state: &BookmarkState) -> Vec<(String, String, bool)> {
    state
        .bookmarks()
        .map(|b| (b.id.clone(), b.title.clone(), b.is_pinned))
        .collect()
}

fn has_unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().all(|id| seen.insert(id))
}

// **At most one record per id**
//
// *For any* sequence of realtime events, the collection SHALL contain
// each id at most once.
//
// **Idempotent delivery**
//
// *For any* sequence of realtime events, delivering every event twice in a
// row SHALL leave the same collection as delivering it once.
//
// **Confirmation and echo commute**
//
// *For any* prior events, applying an insert's confirmation before or after
// its realtime echo SHALL produce the same collection.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn events_never_duplicate_ids(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = BookmarkState::new();
        for event in events {
            state.apply_event(event);
            prop_assert!(has_unique_ids(state.bookmarks().map(|b| b.id.as_str())));
        }
    }

    #[test]
    fn redelivered_events_are_noops(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut once = BookmarkState::new();
        let mut twice = BookmarkState::new();
        for event in events {
            once.apply_event(event.clone());
            twice.apply_event(event.clone());
            twice.apply_event(event);
        }
        prop_assert_eq!(snapshot(&once), snapshot(&twice));
    }

    #[test]
    fn confirmation_and_echo_commute(
        before in proptest::collection::vec(arb_event(), 0..20),
        between in proptest::collection::vec(arb_event(), 0..10),
        title in "[A-Z][a-z]{1,6}",
    ) {
        let mut base = BookmarkState::new();
        for event in before {
            base.apply_event(event);
        }
        let mut temp = bookmark("unused", &title, 100, false);
        temp.id = new_local_id();
        let local_id = temp.id.clone();
        base.insert_placeholder(temp);
        for event in between {
            base.apply_event(event);
        }

        let record = bookmark("new-row", &title, 100, false);

        let mut confirm_first = base.clone();
        confirm_first.confirm_insert(&local_id, record.clone());
        confirm_first.apply_event(ChangeEvent::Insert(record.clone()));

        let mut echo_first = base;
        echo_first.apply_event(ChangeEvent::Insert(record.clone()));
        echo_first.confirm_insert(&local_id, record);

        prop_assert_eq!(snapshot(&confirm_first), snapshot(&echo_first));
        prop_assert!(has_unique_ids(confirm_first.bookmarks().map(|b| b.id.as_str())));
        prop_assert!(!confirm_first.contains(&local_id));
    }

    // *For any* events that follow a realtime delete of an id, no event other
    // than a fresh fetch SHALL bring that id back.
    #[test]
    fn deleted_ids_stay_deleted(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = BookmarkState::new();
        state.apply_event(ChangeEvent::Delete { id: "a".to_string() });
        for event in events {
            state.apply_event(event);
            prop_assert!(!state.contains("a"));
        }
    }
}

// --- Manager-level interleavings ---

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Delete(usize),
    TogglePin(usize),
    RemoteInsert(String),
    RemoteDelete(usize),
    FailInserts(bool),
    FailDeletes(bool),
    FailUpdates(bool),
    Drain,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[A-Z][a-z]{1,6}".prop_map(Op::Add),
        2 => (0usize..8).prop_map(Op::Delete),
        3 => (0usize..8).prop_map(Op::TogglePin),
        1 => "[A-Z][a-z]{1,6}".prop_map(Op::RemoteInsert),
        1 => (0usize..8).prop_map(Op::RemoteDelete),
        1 => any::<bool>().prop_map(Op::FailInserts),
        1 => any::<bool>().prop_map(Op::FailDeletes),
        1 => any::<bool>().prop_map(Op::FailUpdates),
        1 => Just(Op::Drain),
    ]
}

/// Ids of confirmed (non-placeholder) entries, in view order.
fn confirmed_ids(mgr: &BookmarkManager<ScriptedStore>) -> Vec<String> {
    mgr.view()
        .into_iter()
        .filter(|e| !e.bookmark.is_local())
        .map(|e| e.bookmark.id.clone())
        .collect()
}

async fn run_ops(ops: Vec<Op>) -> (Arc<ScriptedStore>, BookmarkManager<ScriptedStore>) {
    let store = Arc::new(ScriptedStore::new());
    let mut mgr = BookmarkManager::new(Arc::clone(&store));
    mgr.activate(session()).await.unwrap();

    for op in ops {
        match op {
            Op::Add(title) => {
                let url = format!("https://{}.example.com", title.to_lowercase());
                mgr.add_optimistic(BookmarkDraft::new(title, url)).unwrap();
            }
            Op::Delete(n) => {
                let ids = confirmed_ids(&mgr);
                if let Some(id) = ids.get(n % ids.len().max(1)) {
                    mgr.delete_optimistic(id).unwrap();
                }
            }
            Op::TogglePin(n) => {
                let ids = confirmed_ids(&mgr);
                if let Some(id) = ids.get(n % ids.len().max(1)) {
                    mgr.toggle_pin(id).unwrap();
                }
            }
            Op::RemoteInsert(title) => {
                let record = NewBookmark {
                    owner_id: OWNER.to_string(),
                    url: format!("https://{}.example.org", title.to_lowercase()),
                    title,
                    description: None,
                    image: None,
                    tags: Vec::new(),
                    is_pinned: false,
                };
                // A rejected remote insert simply never happened.
                let _ = store.insert(&session(), record).await;
            }
            Op::RemoteDelete(n) => {
                let rows = store.rows();
                if let Some(row) = rows.get(n % rows.len().max(1)) {
                    let _ = store.delete(&session(), &row.id).await;
                }
            }
            Op::FailInserts(fail) => store.fail_inserts(fail),
            Op::FailDeletes(fail) => store.fail_deletes(fail),
            Op::FailUpdates(fail) => store.fail_updates(fail),
            Op::Drain => {
                // Lets the spawned writes run against the current failure flags.
                tokio::task::yield_now().await;
                mgr.drain().await;
            }
        }
    }

    mgr.settle().await;
    (store, mgr)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // *For any* interleaving of local intents, remote writes and store failures,
    // once every write has settled the collection SHALL hold each id once,
    // carry no pending markers, and match the store row for row.
    #[test]
    fn settled_collection_matches_store(ops in proptest::collection::vec(arb_op(), 0..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (store, mgr) = runtime.block_on(run_ops(ops));

        prop_assert!(has_unique_ids(mgr.entries().iter().map(|e| e.bookmark.id.as_str())));
        prop_assert_eq!(mgr.pending_count(), 0);
        prop_assert_eq!(mgr.in_flight(), 0);
        prop_assert!(mgr.entries().iter().all(|e| !e.is_pending() && !e.bookmark.is_local()));

        let mut local: Vec<(String, bool)> = mgr
            .entries()
            .iter()
            .map(|e| (e.bookmark.id.clone(), e.bookmark.is_pinned))
            .collect();
        let mut remote: Vec<(String, bool)> = store
            .rows()
            .into_iter()
            .map(|b| (b.id, b.is_pinned))
            .collect();
        local.sort();
        remote.sort();
        prop_assert_eq!(local, remote);
    }
}
