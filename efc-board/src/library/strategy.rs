//! Persistence strategies
//!
//! The library always mirrors its state to local storage; the strategy
//! decides whether a remote document store is involved. `LocalOnly` is used
//! while no identity is active, `Synced` while one is.

use async_trait::async_trait;
use efc_common::Phrase;
use std::sync::Arc;

use crate::remote::{RemoteError, RemoteSync, Subscription};

#[async_trait]
pub trait SyncStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Identity the remote documents belong to
    fn owner_id(&self) -> Option<&str>;

    fn is_remote(&self) -> bool {
        self.owner_id().is_some()
    }

    /// Live subscription to remote documents, `None` for local-only
    async fn subscribe(&self) -> Result<Option<Subscription>, RemoteError>;

    async fn upsert(&self, phrase: &Phrase) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// No remote involvement
pub struct LocalOnly;

#[async_trait]
impl SyncStrategy for LocalOnly {
    fn name(&self) -> &'static str {
        "local-only"
    }

    fn owner_id(&self) -> Option<&str> {
        None
    }

    async fn subscribe(&self) -> Result<Option<Subscription>, RemoteError> {
        Ok(None)
    }

    async fn upsert(&self, _phrase: &Phrase) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Local mirror plus a remote document store scoped to one owner
pub struct Synced {
    remote: Arc<dyn RemoteSync>,
    owner_id: String,
}

impl Synced {
    pub fn new(remote: Arc<dyn RemoteSync>, owner_id: impl Into<String>) -> Self {
        Self {
            remote,
            owner_id: owner_id.into(),
        }
    }
}

#[async_trait]
impl SyncStrategy for Synced {
    fn name(&self) -> &'static str {
        "synced"
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.owner_id)
    }

    async fn subscribe(&self) -> Result<Option<Subscription>, RemoteError> {
        self.remote.subscribe(&self.owner_id).await.map(Some)
    }

    async fn upsert(&self, phrase: &Phrase) -> Result<(), RemoteError> {
        self.remote.upsert(&self.owner_id, phrase).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.remote.delete(&self.owner_id, id).await
    }
}
