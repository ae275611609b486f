//! Bookmark Manager for linkshelf.
//!
//! Owns the reconciled collection of the signed-in user and is its only writer.
//! User intents are applied optimistically and the remote write runs as a
//! spawned task; its completion comes back as a message on the same queue
//! the realtime subscription feeds, and [`BookmarkManager::process_next`]
//! applies whichever arrives first. The merge rules in
//! [`BookmarkState`](super::bookmark_state::BookmarkState) make both orders converge.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use super::bookmark_state::{BookmarkState, MergeEffect};
use super::bookmark_view::derive_view;
use crate::services::metadata_fetcher::MetadataFetcher;
use crate::services::remote_store::{RemoteStore, Subscription};
use crate::types::bookmark::{
    new_local_id, parse_tags, Bookmark, BookmarkDraft, BookmarkEntry, BookmarkPatch, NewBookmark,
};
use crate::types::errors::{BookmarkError, StoreError};
use crate::types::event::{ChangeEvent, ChangeKind};
use crate::types::session::SessionContext;

/// Progress of the initial (or latest) full fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Result of applying one queued message.
#[derive(Debug)]
pub enum Outcome {
    /// A realtime event was merged.
    Merged {
        kind: ChangeKind,
        id: String,
        effect: MergeEffect,
    },
    /// The store confirmed an optimistic insert.
    InsertConfirmed { local_id: String, bookmark: Bookmark },
    /// The insert failed; its placeholder was removed.
    InsertFailed { local_id: String, error: StoreError },
    DeleteConfirmed { id: String },
    /// The delete failed; the collection was reloaded from the store.
    DeleteFailed {
        id: String,
        error: StoreError,
        reload_error: Option<BookmarkError>,
    },
    PinConfirmed { id: String },
    /// The pin update failed; `restored` tells whether the local flip was reverted.
    PinRolledBack {
        id: String,
        restored: bool,
        error: StoreError,
    },
    /// The message belonged to an earlier activation and was dropped.
    Discarded,
}

enum Inbound {
    Remote(ChangeEvent),
    InsertSettled {
        local_id: String,
        result: Result<Bookmark, StoreError>,
    },
    DeleteSettled {
        id: String,
        result: Result<(), StoreError>,
    },
    PinSettled {
        id: String,
        previous: bool,
        result: Result<(), StoreError>,
    },
}

struct Envelope {
    epoch: u64,
    message: Inbound,
}

/// Reconciler between local optimistic edits, write completions and realtime events.
pub struct BookmarkManager<S: RemoteStore + 'static> {
    store: Arc<S>,
    session: Option<SessionContext>,
    subscription: Option<Subscription>,
    state: BookmarkState,
    search_term: String,
    load_state: LoadState,
    /// Bumped on every (de)activation; messages from older epochs are dropped.
    epoch: u64,
    in_flight: usize,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl<S: RemoteStore + 'static> BookmarkManager<S> {
    /// Creates an inactive manager. Call [`activate`](Self::activate) with a session to start.
    pub fn new(store: Arc<S>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            store,
            session: None,
            subscription: None,
            state: BookmarkState::new(),
            search_term: String::new(),
            load_state: LoadState::Idle,
            epoch: 0,
            in_flight: 0,
            inbox_tx,
            inbox_rx,
        }
    }

    // ─── Lifecycle ───

    /// Subscribes to realtime changes for `session`'s owner and loads the full collection.
    ///
    /// The subscription stays open when the load fails; the caller may retry `load_all`.
    pub async fn activate(&mut self, session: SessionContext) -> Result<Vec<Bookmark>, BookmarkError> {
        if !session.is_valid() {
            return Err(BookmarkError::Unauthenticated);
        }
        self.deactivate();

        let subscription = self.store.subscribe(&session)?;
        tracing::info!(
            owner = %session.owner_id,
            subscription = subscription.id(),
            table = subscription.table(),
            "bookmark reconciler activated"
        );
        self.session = Some(session);
        self.subscription = Some(subscription);
        self.load_all().await
    }

    /// Closes the realtime subscription and disposes the collection.
    ///
    /// Writes still in flight complete remotely but their results are discarded.
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::info!(subscription = subscription.id(), "bookmark reconciler deactivated");
            subscription.unsubscribe();
        }
        self.epoch += 1;
        self.in_flight = 0;
        self.state.clear();
        self.load_state = LoadState::Idle;
    }

    /// Deactivates and forgets the session.
    pub fn sign_out(&mut self) {
        self.deactivate();
        self.session = None;
        self.search_term.clear();
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    fn valid_session(&self) -> Result<&SessionContext, BookmarkError> {
        match &self.session {
            Some(session) if session.is_valid() => Ok(session),
            _ => Err(BookmarkError::Unauthenticated),
        }
    }

    fn writable_session(&self) -> Result<SessionContext, BookmarkError> {
        let session = self.valid_session()?;
        if !self.is_active() {
            return Err(BookmarkError::Inactive);
        }
        Ok(session.clone())
    }

    // ─── Reads ───

    /// Replaces the collection with the owner's rows from the store, newest first.
    ///
    /// On failure the current collection is left untouched.
    pub async fn load_all(&mut self) -> Result<Vec<Bookmark>, BookmarkError> {
        let session = self.valid_session()?.clone();
        let previous = self.load_state;
        self.load_state = LoadState::Loading;

        match self.store.list(&session).await {
            Ok(mut rows) => {
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                self.state.replace_all(rows.clone());
                self.load_state = LoadState::Ready;
                tracing::info!(count = rows.len(), "bookmarks loaded");
                Ok(rows)
            }
            Err(e) => {
                self.load_state = if previous == LoadState::Ready {
                    LoadState::Ready
                } else {
                    LoadState::Failed
                };
                tracing::warn!(error = %e, "failed to load bookmarks, keeping current state");
                Err(e.into())
            }
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// The collection in reconciliation order (realtime inserts at the front).
    pub fn entries(&self) -> &[BookmarkEntry] {
        self.state.entries()
    }

    pub fn get(&self, id: &str) -> Option<&BookmarkEntry> {
        self.state.get(id)
    }

    /// Filtered and sorted projection for display.
    pub fn view(&self) -> Vec<&BookmarkEntry> {
        derive_view(self.state.entries(), &self.search_term)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Local writes still waiting for the store.
    pub fn pending_count(&self) -> usize {
        self.state.pending_count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    // ─── Optimistic writes ───

    /// Shows the draft immediately under a temporary id and inserts it remotely.
    pub fn add_optimistic(&mut self, draft: BookmarkDraft) -> Result<Bookmark, BookmarkError> {
        let session = self.writable_session()?;

        let title = draft.title.trim().to_string();
        let url = draft.url.trim().to_string();
        if title.is_empty() {
            return Err(BookmarkError::InvalidDraft("title is required".to_string()));
        }
        if url.is_empty() {
            return Err(BookmarkError::InvalidDraft("url is required".to_string()));
        }

        let record = NewBookmark {
            owner_id: session.owner_id.clone(),
            title,
            url,
            description: draft.description.filter(|d| !d.trim().is_empty()),
            image: draft.image.filter(|i| !i.trim().is_empty()),
            tags: parse_tags(&draft.tags),
            is_pinned: false,
        };
        let placeholder = Bookmark {
            id: new_local_id(),
            owner_id: record.owner_id.clone(),
            title: record.title.clone(),
            url: record.url.clone(),
            description: record.description.clone(),
            image: record.image.clone(),
            tags: record.tags.clone(),
            is_pinned: record.is_pinned,
            created_at: Utc::now(),
        };
        self.state.insert_placeholder(placeholder.clone());
        tracing::debug!(local_id = %placeholder.id, url = %placeholder.url, "optimistic insert");

        let store = Arc::clone(&self.store);
        let local_id = placeholder.id.clone();
        self.spawn_write(async move {
            let result = store.insert(&session, record).await;
            Inbound::InsertSettled { local_id, result }
        });
        Ok(placeholder)
    }

    /// Prefills empty draft fields from the page's metadata, then adds optimistically.
    pub async fn add_with_metadata<F>(
        &mut self,
        mut draft: BookmarkDraft,
        fetcher: &F,
    ) -> Result<Bookmark, BookmarkError>
    where
        F: MetadataFetcher + ?Sized,
    {
        self.writable_session()?;
        if draft.url.trim().is_empty() {
            return Err(BookmarkError::InvalidDraft("url is required".to_string()));
        }
        let metadata = fetcher.fetch(draft.url.trim()).await;
        if metadata.is_empty() {
            tracing::debug!(url = %draft.url, "no metadata found");
        }
        draft.fill_from(&metadata);
        self.add_optimistic(draft)
    }

    /// Removes the bookmark immediately and deletes it remotely.
    ///
    /// If the remote delete fails the whole collection is reloaded.
    pub fn delete_optimistic(&mut self, id: &str) -> Result<(), BookmarkError> {
        let session = self.writable_session()?;
        self.state.remove_optimistic(id)?;
        tracing::debug!(id, "optimistic delete");

        let store = Arc::clone(&self.store);
        let id = id.to_string();
        self.spawn_write(async move {
            let result = store.delete(&session, &id).await;
            Inbound::DeleteSettled { id, result }
        });
        Ok(())
    }

    /// Flips `is_pinned` immediately and updates it remotely. Returns the new value.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool, BookmarkError> {
        let session = self.writable_session()?;
        let previous = self.state.toggle_pin(id)?;
        tracing::debug!(id, pinned = !previous, "optimistic pin toggle");

        let store = Arc::clone(&self.store);
        let id = id.to_string();
        self.spawn_write(async move {
            let result = store.update(&session, &id, BookmarkPatch::pin(!previous)).await;
            Inbound::PinSettled {
                id,
                previous,
                result,
            }
        });
        Ok(!previous)
    }

    fn spawn_write<F>(&mut self, write: F)
    where
        F: Future<Output = Inbound> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        let epoch = self.epoch;
        self.in_flight += 1;
        tokio::spawn(async move {
            let message = write.await;
            // The manager may be gone; nothing left to reconcile then.
            let _ = tx.send(Envelope { epoch, message });
        });
    }

    // ─── Reconciliation ───

    /// Applies a realtime change event directly.
    pub fn merge_remote_event(&mut self, event: ChangeEvent) -> MergeEffect {
        let kind = event.kind();
        let id = event.row_id().to_string();
        let effect = self.state.apply_event(event);
        tracing::debug!(?kind, id = %id, ?effect, "realtime event merged");
        effect
    }

    /// Waits for the next write completion or realtime event and applies it.
    ///
    /// Waits indefinitely when nothing is in flight and no event arrives.
    pub async fn process_next(&mut self) -> Option<Outcome> {
        let envelope = self.next_envelope().await?;
        Some(self.apply(envelope).await)
    }

    /// Applies every message that is already queued, without waiting.
    pub async fn drain(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        loop {
            let envelope = match self.inbox_rx.try_recv() {
                Ok(envelope) => envelope,
                Err(_) => match self.subscription.as_mut().and_then(|s| s.try_recv()) {
                    Some(event) => Envelope {
                        epoch: self.epoch,
                        message: Inbound::Remote(event),
                    },
                    None => break,
                },
            };
            outcomes.push(self.apply(envelope).await);
        }
        outcomes
    }

    /// Processes messages until every write issued so far has completed, then drains the queue.
    pub async fn settle(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while self.in_flight > 0 {
            match self.process_next().await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes.extend(self.drain().await);
        outcomes
    }

    async fn next_envelope(&mut self) -> Option<Envelope> {
        let epoch = self.epoch;
        match self.subscription.as_mut() {
            Some(subscription) => {
                tokio::select! {
                    Some(envelope) = self.inbox_rx.recv() => Some(envelope),
                    Some(event) = subscription.recv() => Some(Envelope {
                        epoch,
                        message: Inbound::Remote(event),
                    }),
                    else => None,
                }
            }
            None => self.inbox_rx.recv().await,
        }
    }

    async fn apply(&mut self, envelope: Envelope) -> Outcome {
        if envelope.epoch != self.epoch {
            tracing::debug!(epoch = envelope.epoch, current = self.epoch, "stale message discarded");
            return Outcome::Discarded;
        }

        match envelope.message {
            Inbound::Remote(event) => {
                let kind = event.kind();
                let id = event.row_id().to_string();
                let effect = self.merge_remote_event(event);
                Outcome::Merged { kind, id, effect }
            }
            Inbound::InsertSettled { local_id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match result {
                    Ok(record) => {
                        let bookmark = self.state.confirm_insert(&local_id, record);
                        tracing::info!(local_id = %local_id, id = %bookmark.id, "insert confirmed");
                        Outcome::InsertConfirmed { local_id, bookmark }
                    }
                    Err(error) => {
                        self.state.fail_insert(&local_id);
                        tracing::warn!(local_id = %local_id, error = %error, "insert failed, placeholder removed");
                        Outcome::InsertFailed { local_id, error }
                    }
                }
            }
            Inbound::DeleteSettled { id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.state.settle_delete(&id);
                match result {
                    Ok(()) => {
                        self.state.confirm_delete(&id);
                        Outcome::DeleteConfirmed { id }
                    }
                    Err(error) => {
                        tracing::warn!(id = %id, error = %error, "delete failed, reloading collection");
                        let reload_error = self.load_all().await.err();
                        if let Some(e) = &reload_error {
                            tracing::error!(id = %id, error = %e, "reload after failed delete also failed");
                        }
                        Outcome::DeleteFailed {
                            id,
                            error,
                            reload_error,
                        }
                    }
                }
            }
            Inbound::PinSettled {
                id,
                previous,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match result {
                    Ok(()) => {
                        self.state.settle_pin(&id, previous, true);
                        Outcome::PinConfirmed { id }
                    }
                    Err(error) => {
                        let restored = self.state.settle_pin(&id, previous, false);
                        tracing::warn!(id = %id, restored, error = %error, "pin update failed, rolled back");
                        Outcome::PinRolledBack {
                            id,
                            restored,
                            error,
                        }
                    }
                }
            }
        }
    }
}
