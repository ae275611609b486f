//! Linkshelf: a personal bookmark shelf with optimistic updates and realtime reconciliation.
//!
//! Entry point: runs a console demo against an in-memory store, showing the
//! optimistic add/pin/delete flow and a realtime change from a second device.

use std::sync::Arc;

use linkshelf::logging;
use linkshelf::managers::bookmark_manager::{BookmarkManager, Outcome};
use linkshelf::services::metadata_fetcher::NoopMetadataFetcher;
use linkshelf::services::remote_store::{RemoteStore, SqliteRemoteStore};
use linkshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use linkshelf::types::bookmark::{BookmarkDraft, NewBookmark};
use linkshelf::types::session::SessionContext;

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn print_view(manager: &BookmarkManager<SqliteRemoteStore>) {
    for entry in manager.view() {
        let b = &entry.bookmark;
        println!(
            "  {} {:<28} {:<32} [{}]{}",
            if b.is_pinned { "📌" } else { "  " },
            b.title,
            b.url,
            b.tags.join(", "),
            if entry.is_pending() { "  (saving…)" } else { "" }
        );
    }
    println!();
}

fn describe(outcomes: &[Outcome]) {
    for outcome in outcomes {
        match outcome {
            Outcome::Merged { kind, id, effect } => println!("  ↳ realtime {:?} {} → {:?}", kind, id, effect),
            Outcome::InsertConfirmed { local_id, bookmark } => {
                println!("  ↳ insert confirmed {} → {}", local_id, bookmark.id)
            }
            Outcome::InsertFailed { local_id, error } => println!("  ↳ insert failed {}: {}", local_id, error),
            Outcome::DeleteConfirmed { id } => println!("  ↳ delete confirmed {}", id),
            Outcome::DeleteFailed { id, error, .. } => println!("  ↳ delete failed {}: {}", id, error),
            Outcome::PinConfirmed { id } => println!("  ↳ pin confirmed {}", id),
            Outcome::PinRolledBack { id, error, .. } => println!("  ↳ pin rolled back {}: {}", id, error),
            Outcome::Discarded => println!("  ↳ stale message discarded"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = SettingsEngine::new(None);
    let loaded = engine.load();
    logging::init(&engine.get_settings().logging);
    if let Err(e) = loaded {
        tracing::warn!(error = %e, "settings unreadable, using defaults");
    }

    println!();
    println!("  Linkshelf v{} (demo mode)", env!("CARGO_PKG_VERSION"));
    println!();

    let store = Arc::new(SqliteRemoteStore::open_in_memory()?);
    let fetcher = NoopMetadataFetcher;
    let session = SessionContext::new("demo-user", "demo-token").with_email("ada@example.com");
    let mut manager = BookmarkManager::new(Arc::clone(&store));

    section("Session");
    let rows = manager.activate(session.clone()).await?;
    println!("  Signed in as {} ({} bookmarks)", session.display_name(), rows.len());
    println!();

    section("Optimistic add");
    manager.add_with_metadata(
        BookmarkDraft::new("The Rust Book", "https://doc.rust-lang.org/book/").with_tags("rust, docs"),
        &fetcher,
    )
    .await?;
    manager.add_with_metadata(
        BookmarkDraft::new("Tokio tutorial", "https://tokio.rs/tokio/tutorial").with_tags("rust, async"),
        &fetcher,
    )
    .await?;
    print_view(&manager);
    describe(&manager.settle().await);
    print_view(&manager);

    section("Realtime change from another device");
    store
        .insert(
            &session,
            NewBookmark {
                owner_id: session.owner_id.clone(),
                title: "Hacker News".to_string(),
                url: "https://news.ycombinator.com".to_string(),
                description: None,
                image: None,
                tags: vec!["news".to_string()],
                is_pinned: false,
            },
        )
        .await?;
    describe(&manager.drain().await);
    print_view(&manager);

    section("Pin and search");
    let oldest = manager.view().last().map(|e| e.bookmark.id.clone());
    if let Some(id) = &oldest {
        manager.toggle_pin(id)?;
        describe(&manager.settle().await);
    }
    manager.set_search_term("rust");
    print_view(&manager);
    manager.set_search_term("");

    section("Optimistic delete");
    if let Some(id) = oldest {
        manager.delete_optimistic(&id)?;
        print_view(&manager);
        describe(&manager.settle().await);
    }
    print_view(&manager);

    section("Sign out");
    manager.sign_out();
    println!("  Active: {}, entries: {}", manager.is_active(), manager.entries().len());
    println!("  Feed subscribers left: {}", store.feed().subscriber_count());
    println!();

    Ok(())
}
