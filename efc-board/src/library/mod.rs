//! Phrase Library Store
//!
//! Owns the canonical phrase list. Every other component reads snapshots or
//! calls the mutation methods here; nothing else mutates the list.
//!
//! Lifecycle is `Uninitialized -> Loading -> Ready`. Mutations are only
//! accepted in `Ready`; anything earlier gets [`LibraryError::NotReady`].
//! In-memory state changes before the mutation returns, durable writes are
//! queued to a single writer task and happen afterwards.

use chrono::Utc;
use efc_common::defaults::DefaultPhrases;
use efc_common::events::{EventBus, LibraryEvent, LoadSource};
use efc_common::uuid_utils::new_phrase_id;
use efc_common::{Phrase, PhraseKind, Pictogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LibraryError;
use crate::export;
use crate::images::ImageMaterializer;
use crate::remote::{RemoteSync, Subscription};
use crate::storage::{load_or_absent, KeyValueStore, PHRASES_KEY};

pub mod merge;
pub mod strategy;
mod writer;

pub use strategy::{LocalOnly, SyncStrategy, Synced};
pub use writer::PersistWriter;

/// Library lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    Uninitialized,
    Loading,
    Ready,
}

/// Collaborators of the library, wired once at startup
pub struct LibraryDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub materializer: Arc<ImageMaterializer>,
    pub defaults: DefaultPhrases,
    pub events: EventBus,
    /// Remote document store; `None` disables synced mode entirely
    pub remote: Option<Arc<dyn RemoteSync>>,
    /// Upper bound for the initial remote snapshot
    pub remote_timeout: Duration,
}

struct LibraryState {
    status: LibraryStatus,
    phrases: Vec<Phrase>,
    strategy: Arc<dyn SyncStrategy>,
    subscription: Option<CancellationToken>,
    /// Bumped on every initialization; stale listeners compare against it
    generation: u64,
}

struct LibraryInner {
    state: RwLock<LibraryState>,
    storage: Arc<dyn KeyValueStore>,
    materializer: Arc<ImageMaterializer>,
    defaults: DefaultPhrases,
    events: EventBus,
    remote: Option<Arc<dyn RemoteSync>>,
    remote_timeout: Duration,
    writer: PersistWriter,
    degraded: Arc<AtomicBool>,
}

/// Shared handle to the phrase library
///
/// Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct PhraseLibrary {
    inner: Arc<LibraryInner>,
}

fn validate_text(text: &str) -> Result<(), LibraryError> {
    if text.trim().is_empty() {
        return Err(LibraryError::Validation(
            "phrase text must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_ready(state: &LibraryState) -> Result<(), LibraryError> {
    match state.status {
        LibraryStatus::Ready => Ok(()),
        other => Err(LibraryError::NotReady(other)),
    }
}

impl PhraseLibrary {
    /// Create an uninitialized library operating local-only
    ///
    /// Must be called within a Tokio runtime (spawns the writer task).
    pub fn new(deps: LibraryDeps) -> Self {
        let degraded = Arc::new(AtomicBool::new(false));
        let writer = PersistWriter::spawn(
            deps.storage.clone(),
            PHRASES_KEY,
            deps.events.clone(),
            degraded.clone(),
        );

        let state = LibraryState {
            status: LibraryStatus::Uninitialized,
            phrases: Vec::new(),
            strategy: Arc::new(LocalOnly),
            subscription: None,
            generation: 0,
        };

        Self {
            inner: Arc::new(LibraryInner {
                state: RwLock::new(state),
                storage: deps.storage,
                materializer: deps.materializer,
                defaults: deps.defaults,
                events: deps.events,
                remote: deps.remote,
                remote_timeout: deps.remote_timeout,
                writer,
                degraded,
            }),
        }
    }

    /// Load, merge, seed, materialize and publish the canonical set
    ///
    /// Runs once per session and again on every identity change. Never
    /// fails: storage and remote problems degrade to local data or
    /// defaults.
    pub async fn initialize(&self) -> LoadSource {
        let (strategy, generation) = {
            let mut state = self.inner.state.write().await;
            if let Some(previous) = state.subscription.take() {
                previous.cancel();
            }
            state.status = LibraryStatus::Loading;
            state.generation += 1;
            (state.strategy.clone(), state.generation)
        };
        info!(strategy = strategy.name(), "Initializing phrase library");

        // Earlier snapshots must be durable before they are read back
        self.inner.writer.flush().await;
        let local: Vec<Phrase> = load_or_absent(self.inner.storage.as_ref(), PHRASES_KEY)
            .await
            .unwrap_or_default();
        debug!(count = local.len(), "Loaded locally persisted phrases");

        let (remote_snapshot, subscription) = self.fetch_remote(strategy.as_ref()).await;

        let (merged, mut source) = match &remote_snapshot {
            Some(remote) => (
                merge::merge_remote_authoritative(&local, remote.clone()),
                LoadSource::Remote,
            ),
            None => (merge::dedupe_by_id(local), LoadSource::Local),
        };

        let merged = if merged.is_empty() {
            source = LoadSource::Defaults;
            let seeded = merge::dedupe_by_id(self.inner.defaults.load());
            info!(count = seeded.len(), "Library empty, seeding default phrases");
            seeded
        } else {
            merged
        };

        let processed = self.inner.materializer.materialize_library(merged).await;

        let mut state = self.inner.state.write().await;
        if state.generation != generation {
            // A newer initialization started while this one was loading
            debug!("Discarding superseded initialization");
            return source;
        }

        state.phrases = processed;
        self.inner.writer.save_local(state.phrases.clone());

        if let Some(remote) = &remote_snapshot {
            let unsynced: Vec<Phrase> = merge::local_only(&state.phrases, remote)
                .into_iter()
                .cloned()
                .collect();
            if !unsynced.is_empty() {
                info!(count = unsynced.len(), "Uploading local-only phrases to remote");
            }
            for phrase in unsynced {
                self.inner.writer.upsert_remote(strategy.clone(), phrase);
            }
        }

        if let Some(subscription) = subscription {
            state.subscription = Some(subscription.cancel_token());
            self.spawn_listener(subscription, generation);
        }

        state.status = LibraryStatus::Ready;
        let phrase_count = state.phrases.len();
        drop(state);

        info!(?source, phrase_count, "Phrase library ready");
        self.inner.events.emit_lossy(LibraryEvent::LibraryLoaded {
            source,
            phrase_count,
            timestamp: Utc::now(),
        });
        source
    }

    async fn fetch_remote(
        &self,
        strategy: &dyn SyncStrategy,
    ) -> (Option<Vec<Phrase>>, Option<Subscription>) {
        if !strategy.is_remote() {
            return (None, None);
        }

        let timeout = self.inner.remote_timeout;
        let subscribed = tokio::time::timeout(timeout, strategy.subscribe()).await;
        let mut subscription = match subscribed {
            Ok(Ok(Some(subscription))) => subscription,
            Ok(Ok(None)) => return (None, None),
            Ok(Err(e)) => {
                self.mark_degraded(e.to_string());
                return (None, None);
            }
            Err(_) => {
                self.mark_degraded(format!("no response within {:?}", timeout));
                return (None, None);
            }
        };

        match tokio::time::timeout(timeout, subscription.next_snapshot()).await {
            Ok(Some(snapshot)) => {
                if self.inner.degraded.swap(false, Ordering::SeqCst) {
                    info!("Remote sync recovered");
                }
                debug!(count = snapshot.len(), "Received remote snapshot");
                (Some(snapshot), Some(subscription))
            }
            Ok(None) => {
                self.mark_degraded("subscription closed before first snapshot".to_string());
                (None, None)
            }
            Err(_) => {
                self.mark_degraded(format!("no snapshot within {:?}", timeout));
                (None, None)
            }
        }
    }

    fn mark_degraded(&self, reason: String) {
        warn!("Remote sync unavailable, using local data: {}", reason);
        if !self.inner.degraded.swap(true, Ordering::SeqCst) {
            self.inner.events.emit_lossy(LibraryEvent::SyncDegraded {
                reason,
                timestamp: Utc::now(),
            });
        }
    }

    fn spawn_listener(&self, mut subscription: Subscription, generation: u64) {
        let weak: Weak<LibraryInner> = Arc::downgrade(&self.inner);
        let cancel = subscription.cancel_token();

        tokio::spawn(async move {
            loop {
                let snapshot = tokio::select! {
                    _ = cancel.cancelled() => break,
                    snapshot = subscription.next_snapshot() => match snapshot {
                        Some(snapshot) => snapshot,
                        None => break,
                    },
                };

                let Some(inner) = weak.upgrade() else { break };
                let library = PhraseLibrary { inner };
                library
                    .apply_remote_snapshot(&mut subscription, snapshot, generation)
                    .await;
            }
            debug!(generation, "Remote listener stopped");
        });
    }

    /// Merge a snapshot pushed by the remote after initialization
    ///
    /// Only the newest queued snapshot is merged, and only once none of our
    /// own remote writes are in flight; older pushes would resurrect records
    /// deleted locally.
    async fn apply_remote_snapshot(
        &self,
        subscription: &mut Subscription,
        mut snapshot: Vec<Phrase>,
        generation: u64,
    ) {
        loop {
            while let Some(newer) = subscription.try_next_snapshot() {
                snapshot = newer;
            }
            let materialized = self
                .inner
                .materializer
                .materialize_library(snapshot.clone())
                .await;

            let mut state = self.inner.state.write().await;
            if let Some(newer) = subscription.try_next_snapshot() {
                snapshot = newer;
                continue;
            }
            if state.generation != generation || state.status != LibraryStatus::Ready {
                return;
            }
            if self.inner.writer.has_pending_remote() {
                debug!("Skipping remote snapshot while own writes are in flight");
                return;
            }

            let merged = merge::merge_remote_authoritative(&state.phrases, materialized);
            if merged == state.phrases {
                return;
            }

            state.phrases = merged;
            self.inner.writer.save_local(state.phrases.clone());
            let phrase_count = state.phrases.len();
            drop(state);

            debug!(phrase_count, "Merged remote snapshot");
            self.inner.events.emit_lossy(LibraryEvent::RemoteSnapshotMerged {
                phrase_count,
                timestamp: Utc::now(),
            });
            return;
        }
    }

    async fn ready_state(&self) -> Result<RwLockWriteGuard<'_, LibraryState>, LibraryError> {
        let state = self.inner.state.write().await;
        require_ready(&state)?;
        Ok(state)
    }

    async fn ensure_ready(&self) -> Result<(), LibraryError> {
        require_ready(&*self.inner.state.read().await)
    }

    /// Create a phrase; the returned record carries the new id
    pub async fn add(
        &self,
        text: &str,
        pictograms: Vec<Pictogram>,
        kind: PhraseKind,
    ) -> Result<Phrase, LibraryError> {
        validate_text(text)?;
        self.ensure_ready().await?;

        let pictograms = self.inner.materializer.materialize_all(&pictograms).await;
        let phrase = Phrase::new(new_phrase_id(), text, pictograms, kind);

        let mut state = self.ready_state().await?;
        state.phrases.push(phrase.clone());
        self.persist(&state, Some(&phrase));
        drop(state);

        info!(phrase_id = %phrase.id, kind = kind.as_str(), "Phrase added");
        self.inner.events.emit_lossy(LibraryEvent::PhraseAdded {
            phrase_id: phrase.id.clone(),
            text: phrase.text.clone(),
            timestamp: Utc::now(),
        });
        Ok(phrase)
    }

    /// Replace text, pictograms and kind; `Ok(None)` if the id is unknown
    ///
    /// Id and usage count are preserved.
    pub async fn update(
        &self,
        id: &str,
        text: &str,
        pictograms: Vec<Pictogram>,
        kind: PhraseKind,
    ) -> Result<Option<Phrase>, LibraryError> {
        validate_text(text)?;
        self.ensure_ready().await?;

        let pictograms = self.inner.materializer.materialize_all(&pictograms).await;

        let mut state = self.ready_state().await?;
        let Some(existing) = state.phrases.iter_mut().find(|p| p.id == id) else {
            debug!(phrase_id = %id, "Update of unknown phrase ignored");
            return Ok(None);
        };
        existing.text = text.to_string();
        existing.pictograms = pictograms;
        existing.kind = kind;
        let updated = existing.clone();
        self.persist(&state, Some(&updated));
        drop(state);

        info!(phrase_id = %id, "Phrase updated");
        self.inner.events.emit_lossy(LibraryEvent::PhraseUpdated {
            phrase_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(Some(updated))
    }

    /// Remove a phrase; `Ok(false)` if the id is unknown
    pub async fn delete(&self, id: &str) -> Result<bool, LibraryError> {
        let mut state = self.ready_state().await?;
        let before = state.phrases.len();
        state.phrases.retain(|p| p.id != id);
        if state.phrases.len() == before {
            debug!(phrase_id = %id, "Delete of unknown phrase ignored");
            return Ok(false);
        }

        self.inner.writer.save_local(state.phrases.clone());
        self.inner
            .writer
            .delete_remote(state.strategy.clone(), id.to_string());
        drop(state);

        info!(phrase_id = %id, "Phrase deleted");
        self.inner.events.emit_lossy(LibraryEvent::PhraseDeleted {
            phrase_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Bump the usage counter; returns the new count, `Ok(None)` if unknown
    pub async fn increment_usage(&self, id: &str) -> Result<Option<u64>, LibraryError> {
        let mut state = self.ready_state().await?;
        let Some(phrase) = state.phrases.iter_mut().find(|p| p.id == id) else {
            debug!(phrase_id = %id, "Usage increment of unknown phrase ignored");
            return Ok(None);
        };
        phrase.usage_count += 1;
        let usage_count = phrase.usage_count;
        let updated = phrase.clone();
        self.persist(&state, Some(&updated));
        drop(state);

        debug!(phrase_id = %id, usage_count, "Usage incremented");
        self.inner.events.emit_lossy(LibraryEvent::UsageIncremented {
            phrase_id: id.to_string(),
            usage_count,
            timestamp: Utc::now(),
        });
        Ok(Some(usage_count))
    }

    /// Discard every record and re-seed from the default set
    pub async fn reset_to_defaults(&self) -> Result<usize, LibraryError> {
        self.ensure_ready().await?;

        let seeded = merge::dedupe_by_id(self.inner.defaults.load());
        let seeded = self.inner.materializer.materialize_library(seeded).await;

        let mut state = self.ready_state().await?;
        let new_ids: HashSet<&str> = seeded.iter().map(|p| p.id.as_str()).collect();
        let removed: Vec<String> = state
            .phrases
            .iter()
            .filter(|p| !new_ids.contains(p.id.as_str()))
            .map(|p| p.id.clone())
            .collect();

        state.phrases = seeded;
        self.inner.writer.save_local(state.phrases.clone());
        for id in removed {
            self.inner.writer.delete_remote(state.strategy.clone(), id);
        }
        for phrase in &state.phrases {
            self.inner
                .writer
                .upsert_remote(state.strategy.clone(), phrase.clone());
        }
        let phrase_count = state.phrases.len();
        drop(state);

        info!(phrase_count, "Library reset to defaults");
        self.inner.events.emit_lossy(LibraryEvent::LibraryReset {
            phrase_count,
            timestamp: Utc::now(),
        });
        Ok(phrase_count)
    }

    /// Merge imported records by id (imported version wins)
    ///
    /// Returns the number of records imported.
    pub async fn import(&self, imported: Vec<Phrase>) -> Result<usize, LibraryError> {
        if let Some(invalid) = imported.iter().find(|p| p.text.trim().is_empty()) {
            return Err(LibraryError::Validation(format!(
                "imported phrase {} has empty text",
                invalid.id
            )));
        }
        self.ensure_ready().await?;

        let imported = merge::dedupe_by_id(imported);
        let imported = self.inner.materializer.materialize_library(imported).await;
        let count = imported.len();

        let mut state = self.ready_state().await?;
        state.phrases = merge::merge_imported(&state.phrases, imported.clone());
        self.inner.writer.save_local(state.phrases.clone());
        for phrase in imported {
            self.inner.writer.upsert_remote(state.strategy.clone(), phrase);
        }
        let phrase_count = state.phrases.len();
        drop(state);

        info!(imported = count, phrase_count, "Phrases imported");
        self.inner.events.emit_lossy(LibraryEvent::LibraryImported {
            imported: count,
            phrase_count,
            timestamp: Utc::now(),
        });
        Ok(count)
    }

    /// Pretty-printed JSON document of the whole library
    pub async fn export_json(&self) -> efc_common::Result<String> {
        export::to_pretty_json(&self.snapshot().await)
    }

    /// Remove the locally persisted copy; in-memory state is untouched
    pub async fn clear_cache(&self) {
        self.inner.writer.flush().await;
        match self.inner.storage.remove(PHRASES_KEY).await {
            Ok(()) => info!("Local phrase cache cleared"),
            Err(e) => warn!("Could not clear local phrase cache: {}", e),
        }
    }

    /// Swap the persistence strategy for a new identity and reload
    ///
    /// `None` signs out (local-only). Any live subscription is torn down.
    pub async fn switch_identity(&self, owner_id: Option<String>) -> LoadSource {
        let strategy: Arc<dyn SyncStrategy> = match (owner_id, &self.inner.remote) {
            (Some(owner), Some(remote)) => Arc::new(Synced::new(remote.clone(), owner)),
            (Some(owner), None) => {
                warn!(owner_id = %owner, "No remote store configured, staying local-only");
                Arc::new(LocalOnly)
            }
            (None, _) => Arc::new(LocalOnly),
        };

        {
            let mut state = self.inner.state.write().await;
            info!(
                from = state.strategy.name(),
                to = strategy.name(),
                "Switching library identity"
            );
            state.strategy = strategy;
        }
        self.inner.degraded.store(false, Ordering::SeqCst);
        self.initialize().await
    }

    /// Queue the local snapshot and, if given, the remote upsert of `changed`
    fn persist(&self, state: &LibraryState, changed: Option<&Phrase>) {
        self.inner.writer.save_local(state.phrases.clone());
        if let Some(phrase) = changed {
            self.inner
                .writer
                .upsert_remote(state.strategy.clone(), phrase.clone());
        }
    }

    /// Wait until every queued write has been attempted
    pub async fn flush(&self) {
        self.inner.writer.flush().await;
    }

    /// Read-only copy of the canonical list
    pub async fn snapshot(&self) -> Vec<Phrase> {
        self.inner.state.read().await.phrases.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Phrase> {
        self.inner
            .state
            .read()
            .await
            .phrases
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn status(&self) -> LibraryStatus {
        self.inner.state.read().await.status
    }

    /// Active identity, `None` while local-only
    pub async fn owner_id(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .strategy
            .owner_id()
            .map(str::to_string)
    }

    pub async fn strategy_name(&self) -> &'static str {
        self.inner.state.read().await.strategy.name()
    }

    /// True after a remote failure until the next successful remote call
    pub fn is_sync_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}
