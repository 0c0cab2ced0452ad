//! Key-value backend trait.
//!
//! Models a persistent, per-origin string store shared by every editing
//! session. Implementations live in taskdraft-infra (SQLite) and in
//! [`super::memory`] (in-process).

use std::future::Future;

use taskdraft_types::error::StorageError;

/// Trait for a flat string-to-string persistent store.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KeyValueBackend: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get_item(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Set a value for a key (upsert).
    fn set_item(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn remove_item(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// List every key in the store, in no particular order.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Sum of the UTF-8 byte lengths of every key and value.
    fn total_bytes(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;
}
