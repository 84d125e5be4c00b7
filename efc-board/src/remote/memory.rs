//! In-process remote document store
//!
//! Holds documents per owner in insertion order and pushes full snapshots to
//! subscribers on every change. Availability can be switched off to
//! simulate an unreachable backend.

use super::{RemoteError, RemoteSync, Subscription};
use async_trait::async_trait;
use efc_common::Phrase;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Subscriber {
    owner_id: String,
    tx: mpsc::UnboundedSender<Vec<Phrase>>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Vec<Phrase>>,
    subscribers: Vec<Subscriber>,
}

pub struct MemoryRemote {
    inner: Mutex<Inner>,
    available: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Current documents of `owner_id`
    pub fn documents(&self, owner_id: &str) -> Vec<Phrase> {
        self.inner
            .lock()
            .map(|inner| inner.documents.get(owner_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Replace `owner_id`'s documents wholesale, as another device would
    pub fn replace_documents(&self, owner_id: &str, phrases: Vec<Phrase>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.documents.insert(owner_id.to_string(), phrases);
            notify(&mut inner, owner_id);
        }
    }

    /// Live subscriber count for `owner_id`
    pub fn subscriber_count(&self, owner_id: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .subscribers
                    .iter()
                    .filter(|s| s.owner_id == owner_id && !s.cancel.is_cancelled())
                    .count()
            })
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("remote store offline".to_string()))
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, RemoteError> {
        self.inner
            .lock()
            .map_err(|_| RemoteError::Rejected("remote store lock poisoned".to_string()))
    }
}

/// Push the owner's snapshot to every live subscriber, dropping dead ones
fn notify(inner: &mut Inner, owner_id: &str) {
    let snapshot = inner.documents.get(owner_id).cloned().unwrap_or_default();
    inner.subscribers.retain(|s| {
        if s.cancel.is_cancelled() {
            return false;
        }
        if s.owner_id != owner_id {
            return true;
        }
        s.tx.send(snapshot.clone()).is_ok()
    });
}

#[async_trait]
impl RemoteSync for MemoryRemote {
    async fn subscribe(&self, owner_id: &str) -> Result<Subscription, RemoteError> {
        self.check_available()?;
        let mut inner = self.lock()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let snapshot = inner.documents.get(owner_id).cloned().unwrap_or_default();
        // Receiver is alive, send cannot fail here
        let _ = tx.send(snapshot);

        inner.subscribers.push(Subscriber {
            owner_id: owner_id.to_string(),
            tx,
            cancel: cancel.clone(),
        });
        debug!(owner_id, "Remote subscription registered");

        Ok(Subscription::new(rx, cancel))
    }

    async fn upsert(&self, owner_id: &str, phrase: &Phrase) -> Result<(), RemoteError> {
        self.check_available()?;
        let mut inner = self.lock()?;

        let documents = inner.documents.entry(owner_id.to_string()).or_default();
        match documents.iter_mut().find(|p| p.id == phrase.id) {
            Some(existing) => *existing = phrase.clone(),
            None => documents.push(phrase.clone()),
        }

        notify(&mut inner, owner_id);
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), RemoteError> {
        self.check_available()?;
        let mut inner = self.lock()?;

        if let Some(documents) = inner.documents.get_mut(owner_id) {
            documents.retain(|p| p.id != id);
        }

        notify(&mut inner, owner_id);
        Ok(())
    }
}
