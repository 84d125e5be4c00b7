//! Remote sync adapter
//!
//! A per-owner document store (one document per phrase, keyed by phrase id)
//! with live subscriptions. Only present while a user identity is active.
//! Writes for the same id are last-write-wins by arrival order.

use async_trait::async_trait;
use efc_common::Phrase;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod memory;

pub use memory::MemoryRemote;

/// Remote store failures; callers fall back to local-only operation
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Store unreachable
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Store reachable but refused the operation
    #[error("Remote store rejected operation: {0}")]
    Rejected(String),
}

/// Live view of one owner's documents
///
/// Yields the full document set once immediately and again after every
/// remote change. Dropping the subscription unsubscribes.
pub struct Subscription {
    snapshots: mpsc::UnboundedReceiver<Vec<Phrase>>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(snapshots: mpsc::UnboundedReceiver<Vec<Phrase>>, cancel: CancellationToken) -> Self {
        Self { snapshots, cancel }
    }

    /// Next full document set; `None` once the remote side closed
    pub async fn next_snapshot(&mut self) -> Option<Vec<Phrase>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.snapshots.recv().await
    }

    /// Snapshot already delivered but not yet consumed, without waiting
    pub fn try_next_snapshot(&mut self) -> Option<Vec<Phrase>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.snapshots.try_recv().ok()
    }

    /// Token cancelled when this subscription ends
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cloud document store keyed by user identity
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Register a live observer of `owner_id`'s documents
    async fn subscribe(&self, owner_id: &str) -> Result<Subscription, RemoteError>;

    /// Write one phrase document
    async fn upsert(&self, owner_id: &str, phrase: &Phrase) -> Result<(), RemoteError>;

    /// Remove one phrase document
    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), RemoteError>;
}
