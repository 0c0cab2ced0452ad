//! In-process key-value backend.
//!
//! `MemoryBackend` is a concurrent string store backed by `DashMap`.
//! Cloning produces a shared view of the same data, so a caller can hold
//! one handle while a `DraftStore` owns another. Availability can be
//! toggled to exercise the in-memory-only path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use taskdraft_types::error::StorageError;

use super::backend::KeyValueBackend;

#[derive(Debug, Default)]
struct Inner {
    entries: DashMap<String, String>,
    unavailable: AtomicBool,
    writes: DashMap<String, u64>,
}

/// Shared in-memory implementation of [`KeyValueBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a disabled store (private browsing, storage turned off).
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of successful `set_item` calls for `key` so far.
    pub fn write_count(&self, key: &str) -> u64 {
        self.inner.writes.get(key).map_or(0, |r| *r.value())
    }

    /// Read a raw value without going through the async interface.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.entries.get(key).map(|r| r.value().clone())
    }

    /// Write a raw value without counting it as a store write.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueBackend for MemoryBackend {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.entries.insert(key.to_string(), value.to_string());
        *self.inner.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self.inner.entries.iter().map(|r| r.key().clone()).collect())
    }

    async fn total_bytes(&self) -> Result<u64, StorageError> {
        self.check()?;
        Ok(self
            .inner
            .entries
            .iter()
            .map(|r| (r.key().len() + r.value().len()) as u64)
            .sum())
    }
}
