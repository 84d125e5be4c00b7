//! Persistence adapter
//!
//! Durable key/value storage of JSON values. Read failures are reported as
//! [`StorageError::Read`] but callers treat them as "absent" so the board
//! keeps working offline; write failures are logged and considered lost.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage key holding the serialized phrase list
pub const PHRASES_KEY: &str = "phrases_data";

/// Persistence medium failures
#[derive(Debug, Error)]
pub enum StorageError {
    /// Stored value unreadable (corrupt encoding, I/O failure)
    #[error("Storage read failed for {key}: {reason}")]
    Read { key: String, reason: String },

    /// Medium rejected the write (quota, I/O failure)
    #[error("Storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },
}

impl StorageError {
    pub fn read(key: &str, reason: impl ToString) -> Self {
        StorageError::Read {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(key: &str, reason: impl ToString) -> Self {
        StorageError::Write {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Key/value persistence of JSON values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, overwriting any prior value
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Previously saved value, `None` if never written
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Delete the entry; no-op if absent
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Serialize `value` and save it under `key`
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(value).map_err(|e| StorageError::write(key, e))?;
    store.save(key, &value).await
}

/// Load and decode the value under `key`
///
/// A value that does not decode as `T` is a read failure.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.load(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::read(key, e)),
        None => Ok(None),
    }
}

/// Load `key`, treating any read failure as absent
pub async fn load_or_absent<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match load_json(store, key).await {
        Ok(value) => value,
        Err(e) => {
            warn!("{} (treating as absent)", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efc_common::{Phrase, PhraseKind};

    #[tokio::test]
    async fn test_save_then_load_json() {
        let store = MemoryStore::new();
        let phrases = vec![Phrase::new("1", "Hola", vec![], PhraseKind::Phrase)];

        save_json(&store, PHRASES_KEY, &phrases).await.unwrap();
        let loaded: Option<Vec<Phrase>> = load_json(&store, PHRASES_KEY).await.unwrap();
        assert_eq!(loaded, Some(phrases));
    }

    #[tokio::test]
    async fn test_never_written_is_absent() {
        let store = MemoryStore::new();
        let loaded: Option<Vec<Phrase>> = load_json(&store, PHRASES_KEY).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_read_error_and_absent() {
        let store = MemoryStore::new();
        store
            .save(PHRASES_KEY, &serde_json::json!({"not": "a list"}))
            .await
            .unwrap();

        let result: Result<Option<Vec<Phrase>>, _> = load_json(&store, PHRASES_KEY).await;
        assert!(matches!(result, Err(StorageError::Read { .. })));

        let absent: Option<Vec<Phrase>> = load_or_absent(&store, PHRASES_KEY).await;
        assert!(absent.is_none());
    }
}
