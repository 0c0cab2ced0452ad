//! Sentinel-returning wrapper over a [`KeyValueBackend`].
//!
//! Nothing in this module returns an error: failures are logged and turned
//! into `None`/`false`/empty results. Callers treat an unavailable store as
//! "persistence is a no-op", never as fatal.

use taskdraft_types::error::StorageError;

use super::backend::KeyValueBackend;

/// Key written and removed to probe whether the store accepts writes.
const PROBE_KEY: &str = "__taskdraft_probe__";

/// Byte-ceiling-aware view of the backend.
pub struct StorageAdapter<B> {
    backend: B,
    ceiling_bytes: u64,
}

impl<B: KeyValueBackend> StorageAdapter<B> {
    pub fn new(backend: B, ceiling_bytes: u64) -> Self {
        Self {
            backend,
            ceiling_bytes,
        }
    }

    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    /// Probe the store with a throwaway write.
    pub async fn is_available(&self) -> bool {
        let probe = async {
            self.backend.set_item(PROBE_KEY, PROBE_KEY).await?;
            self.backend.remove_item(PROBE_KEY).await?;
            Ok::<_, StorageError>(())
        };
        match probe.await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "draft storage probe failed");
                false
            }
        }
    }

    /// Approximate bytes occupied by every key and value in the store.
    ///
    /// Returns 0 when the backend cannot report usage; the subsequent
    /// write will surface the real failure.
    pub async fn usage_bytes(&self) -> u64 {
        match self.backend.total_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to measure draft storage usage");
                0
            }
        }
    }

    /// Bytes left under the ceiling.
    pub async fn available_bytes(&self) -> u64 {
        self.ceiling_bytes.saturating_sub(self.usage_bytes().await)
    }

    /// Soft admission check: `usage + additional < ceiling`.
    pub async fn will_fit(&self, additional_bytes: u64) -> bool {
        self.usage_bytes().await.saturating_add(additional_bytes) < self.ceiling_bytes
    }

    pub async fn read(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "draft storage read failed");
                None
            }
        }
    }

    /// Write a value. Returns false when the backend refused it.
    pub async fn write(&self, key: &str, value: &str) -> bool {
        match self.backend.set_item(key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "draft storage write failed");
                false
            }
        }
    }

    /// Delete a value. Returns true when the backend did not error,
    /// whether or not the key existed.
    pub async fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "draft storage remove failed");
                false
            }
        }
    }

    /// Every key starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys().await {
            Ok(keys) => {
                let mut keys: Vec<String> =
                    keys.into_iter().filter(|k| k.starts_with(prefix)).collect();
                keys.sort();
                keys
            }
            Err(e) => {
                tracing::warn!(prefix, error = %e, "failed to list draft storage keys");
                Vec::new()
            }
        }
    }
}
