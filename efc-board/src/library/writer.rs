//! Serialized persistence writer
//!
//! All durable writes of one library go through a single task that applies
//! them in the order they were queued, so an older snapshot can never land
//! after a newer one. Consecutive local snapshots are coalesced to the
//! latest. Remote failures are logged and mark the library as degraded.

use chrono::Utc;
use efc_common::events::{EventBus, LibraryEvent};
use efc_common::Phrase;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::strategy::SyncStrategy;
use crate::storage::{save_json, KeyValueStore};

enum WriteOp {
    SaveLocal(Vec<Phrase>),
    RemoteUpsert {
        strategy: Arc<dyn SyncStrategy>,
        phrase: Phrase,
    },
    RemoteDelete {
        strategy: Arc<dyn SyncStrategy>,
        id: String,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task
#[derive(Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
    pending_remote: Arc<AtomicUsize>,
}

struct WriterContext {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    events: EventBus,
    degraded: Arc<AtomicBool>,
    pending_remote: Arc<AtomicUsize>,
}

impl PersistWriter {
    /// Spawn the writer task; must be called within a Tokio runtime
    pub fn spawn(
        storage: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        events: EventBus,
        degraded: Arc<AtomicBool>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending_remote = Arc::new(AtomicUsize::new(0));
        let context = WriterContext {
            storage,
            key: key.into(),
            events,
            degraded,
            pending_remote: pending_remote.clone(),
        };
        tokio::spawn(run(rx, context));
        Self { tx, pending_remote }
    }

    pub fn save_local(&self, phrases: Vec<Phrase>) {
        self.send(WriteOp::SaveLocal(phrases));
    }

    pub fn upsert_remote(&self, strategy: Arc<dyn SyncStrategy>, phrase: Phrase) {
        if strategy.is_remote() {
            self.pending_remote.fetch_add(1, Ordering::SeqCst);
            self.send(WriteOp::RemoteUpsert { strategy, phrase });
        }
    }

    pub fn delete_remote(&self, strategy: Arc<dyn SyncStrategy>, id: String) {
        if strategy.is_remote() {
            self.pending_remote.fetch_add(1, Ordering::SeqCst);
            self.send(WriteOp::RemoteDelete { strategy, id });
        }
    }

    /// Wait until every write queued before this call has been attempted
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(WriteOp::Flush(ack_tx));
        let _ = ack_rx.await;
    }

    /// Remote writes queued but not yet attempted
    ///
    /// Snapshots pushed by the remote while this is non-zero may be echoes
    /// of our own older writes.
    pub fn has_pending_remote(&self) -> bool {
        self.pending_remote.load(Ordering::SeqCst) > 0
    }

    fn send(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            warn!("Persistence writer stopped; write dropped");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<WriteOp>, context: WriterContext) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(op) = rx.try_recv() {
            batch.push(op);
        }

        let count = batch.len();
        let mut ops = batch.into_iter().peekable();
        while let Some(op) = ops.next() {
            let superseded = matches!(op, WriteOp::SaveLocal(_))
                && matches!(ops.peek(), Some(WriteOp::SaveLocal(_)));
            if superseded {
                continue;
            }
            apply(op, &context).await;
        }
        debug!(ops = count, "Persistence batch applied");
    }
    debug!("Persistence writer finished");
}

async fn apply(op: WriteOp, context: &WriterContext) {
    match op {
        WriteOp::SaveLocal(phrases) => {
            if let Err(e) = save_json(context.storage.as_ref(), &context.key, &phrases).await {
                // In-memory state still reflects the mutation for this session
                warn!("Local persistence failed, change kept in memory only: {}", e);
            }
        }
        WriteOp::RemoteUpsert { strategy, phrase } => {
            let result = strategy.upsert(&phrase).await;
            context.pending_remote.fetch_sub(1, Ordering::SeqCst);
            record_remote_result(context, result.map_err(|e| e.to_string()), &phrase.id);
        }
        WriteOp::RemoteDelete { strategy, id } => {
            let result = strategy.delete(&id).await;
            context.pending_remote.fetch_sub(1, Ordering::SeqCst);
            record_remote_result(context, result.map_err(|e| e.to_string()), &id);
        }
        WriteOp::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}

fn record_remote_result(context: &WriterContext, result: Result<(), String>, phrase_id: &str) {
    match result {
        Ok(()) => {
            if context.degraded.swap(false, Ordering::SeqCst) {
                info!("Remote sync recovered");
            }
        }
        Err(reason) => {
            warn!(phrase_id, "Remote write failed, continuing local-only: {}", reason);
            if !context.degraded.swap(true, Ordering::SeqCst) {
                context.events.emit_lossy(LibraryEvent::SyncDegraded {
                    reason,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::strategy::{LocalOnly, Synced};
    use crate::remote::MemoryRemote;
    use crate::storage::{load_json, MemoryStore, PHRASES_KEY};
    use efc_common::PhraseKind;

    fn phrase(id: &str, text: &str) -> Phrase {
        Phrase::new(id, text, vec![], PhraseKind::Phrase)
    }

    #[tokio::test]
    async fn test_last_queued_snapshot_is_durable() {
        let storage = Arc::new(MemoryStore::new());
        let writer = PersistWriter::spawn(
            storage.clone(),
            PHRASES_KEY,
            EventBus::new(16),
            Arc::new(AtomicBool::new(false)),
        );

        for n in 0..50 {
            writer.save_local(vec![phrase("1", &format!("v{}", n))]);
        }
        writer.flush().await;

        let stored: Vec<Phrase> = load_json(storage.as_ref(), PHRASES_KEY).await.unwrap().unwrap();
        assert_eq!(stored[0].text, "v49");
    }

    #[tokio::test]
    async fn test_local_only_strategy_skips_remote_ops() {
        let storage = Arc::new(MemoryStore::new());
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let degraded = Arc::new(AtomicBool::new(false));
        let writer = PersistWriter::spawn(storage.clone(), PHRASES_KEY, events, degraded.clone());

        writer.upsert_remote(Arc::new(LocalOnly), phrase("1", "Hola"));
        writer.delete_remote(Arc::new(LocalOnly), "1".to_string());
        assert!(!writer.has_pending_remote());
        writer.flush().await;

        assert!(!degraded.load(Ordering::SeqCst));
        assert!(rx.try_recv().is_err());
        assert!(storage.raw(PHRASES_KEY).is_none());
    }

    #[tokio::test]
    async fn test_remote_failure_marks_degraded_and_recovers() {
        let storage = Arc::new(MemoryStore::new());
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let degraded = Arc::new(AtomicBool::new(false));
        let writer = PersistWriter::spawn(storage, PHRASES_KEY, events, degraded.clone());

        let remote = Arc::new(MemoryRemote::new());
        let strategy: Arc<dyn SyncStrategy> = Arc::new(Synced::new(remote.clone(), "alice"));

        remote.set_available(false);
        writer.upsert_remote(strategy.clone(), phrase("1", "Hola"));
        writer.flush().await;
        assert!(degraded.load(Ordering::SeqCst));
        assert!(matches!(rx.recv().await.unwrap(), LibraryEvent::SyncDegraded { .. }));

        remote.set_available(true);
        writer.upsert_remote(strategy, phrase("1", "Hola"));
        writer.flush().await;
        assert!(!degraded.load(Ordering::SeqCst));
        assert_eq!(remote.documents("alice").len(), 1);
    }

    #[tokio::test]
    async fn test_remote_ops_apply_in_call_order() {
        let storage = Arc::new(MemoryStore::new());
        let writer = PersistWriter::spawn(
            storage,
            PHRASES_KEY,
            EventBus::new(16),
            Arc::new(AtomicBool::new(false)),
        );
        let remote = Arc::new(MemoryRemote::new());
        let strategy: Arc<dyn SyncStrategy> = Arc::new(Synced::new(remote.clone(), "alice"));

        writer.upsert_remote(strategy.clone(), phrase("1", "primero"));
        writer.upsert_remote(strategy.clone(), phrase("1", "segundo"));
        writer.delete_remote(strategy.clone(), "1".to_string());
        writer.upsert_remote(strategy, phrase("1", "tercero"));
        writer.flush().await;
        assert!(!writer.has_pending_remote());

        let documents = remote.documents("alice");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "tercero");
    }
}
