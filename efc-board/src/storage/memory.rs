//! In-memory key/value store
//!
//! Values are held in their serialized form so corrupt entries can be
//! simulated. Writes can be switched to fail.

use super::{KeyValueStore, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save/remove fail with a write error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store raw text under `key`, bypassing serialization
    pub fn insert_raw(&self, key: &str, raw: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), raw.to_string());
        }
    }

    /// Raw stored text for `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn check_writable(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::write(key, "medium rejected write"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.check_writable(key)?;
        let raw = serde_json::to_string(value).map_err(|e| StorageError::write(key, e))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::write(key, "store lock poisoned"))?;
        entries.insert(key.to_string(), raw);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::read(key, "store lock poisoned"))?;
        match entries.get(key) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| StorageError::read(key, e)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::write(key, "store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
