//! Process-wide projection of draft storage.
//!
//! `PersistenceRegistry` mirrors per-key `DraftMetadata` and
//! `AutoSaveStatus` in `DashMap`s so UI code can query them on every render
//! without touching storage. Read methods are plain lookups that clone the
//! value out, so no `DashMap` guard outlives the call.
//!
//! Mutation is `pub(crate)`: only the draft store writes here, through its
//! own operations and the one-time bootstrap scan. The registry is never
//! persisted; losing it is harmless because bootstrap rebuilds it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use taskdraft_types::draft::{AutoSaveStatus, DraftMetadata, StorageKey};

static GLOBAL: OnceLock<Arc<PersistenceRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct PersistenceRegistry {
    metadata: DashMap<String, DraftMetadata>,
    status: DashMap<String, AutoSaveStatus>,
    initialized: AtomicBool,
}

impl PersistenceRegistry {
    /// Create an empty, uninitialized registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every draft store in this process.
    pub fn global() -> Arc<PersistenceRegistry> {
        GLOBAL.get_or_init(|| Arc::new(PersistenceRegistry::new())).clone()
    }

    /// Whether the bootstrap scan has populated this registry.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn metadata(&self, key: &str) -> Option<DraftMetadata> {
        self.metadata.get(key).map(|r| r.value().clone())
    }

    pub fn has_draft(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Auto-save status for `key`; idle when nothing was attempted yet.
    pub fn status(&self, key: &str) -> AutoSaveStatus {
        self.status
            .get(key)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// All known drafts, most recently saved first.
    pub fn list(&self) -> Vec<DraftMetadata> {
        let mut all: Vec<DraftMetadata> = self.metadata.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.key.cmp(&b.key)));
        all
    }

    /// Known drafts in one course/lesson/user scope, most recent first.
    pub fn drafts_for_scope(
        &self,
        namespace: &str,
        course_id: &str,
        lesson_id: &str,
        user_id: &str,
    ) -> Vec<DraftMetadata> {
        self.list()
            .into_iter()
            .filter(|m| {
                StorageKey::parse(namespace, &m.key)
                    .is_some_and(|k| k.in_scope(course_id, lesson_id, user_id))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    // -- mutation, draft store only --

    /// Replace every metadata entry with the result of a storage scan.
    ///
    /// Auto-save statuses are kept; they describe sessions, not storage.
    pub(crate) fn rebuild(&self, entries: impl IntoIterator<Item = DraftMetadata>) {
        self.metadata.clear();
        for meta in entries {
            self.metadata.insert(meta.key.clone(), meta);
        }
        self.initialized.store(true, Ordering::Release);
    }

    pub(crate) fn upsert(&self, meta: DraftMetadata) {
        self.metadata.insert(meta.key.clone(), meta);
    }

    /// Drop everything known about `key`.
    pub(crate) fn forget(&self, key: &str) {
        self.metadata.remove(key);
        self.status.remove(key);
    }

    pub(crate) fn begin_save(&self, key: &str) {
        self.status.entry(key.to_string()).or_default().begin();
    }

    pub(crate) fn finish_save(&self, key: &str, saved_at: chrono::DateTime<chrono::Utc>) {
        self.status.entry(key.to_string()).or_default().succeed(saved_at);
    }

    pub(crate) fn fail_save(&self, key: &str, error: &str) {
        self.status.entry(key.to_string()).or_default().fail(error);
    }
}
