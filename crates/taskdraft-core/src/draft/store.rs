//! Draft store: save, load, remove, list and expire drafts.
//!
//! `DraftStore` is the only component that touches the key-value backend.
//! It combines the storage adapter, codec and validators, keeps the
//! persistence registry in step with storage, and publishes notifications
//! on the event bus. Failures come back as a tagged [`DraftError`] and are
//! mirrored into the key's `AutoSaveStatus`; nothing here panics or blocks
//! in-memory editing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskdraft_types::config::DraftConfig;
use taskdraft_types::draft::{DraftMetadata, LoadedDraft, StorageInfo, StorageKey};
use taskdraft_types::error::DraftError;
use taskdraft_types::event::DraftEvent;
use taskdraft_types::form::{FormData, FormType};

use super::codec::DraftCodec;
use super::registry::PersistenceRegistry;
use super::validator;
use crate::event::EventBus;
use crate::storage::{KeyValueBackend, StorageAdapter};

pub struct DraftStore<B> {
    adapter: StorageAdapter<B>,
    codec: DraftCodec,
    registry: Arc<PersistenceRegistry>,
    events: EventBus,
    config: DraftConfig,
}

impl<B: KeyValueBackend> DraftStore<B> {
    pub fn new(
        backend: B,
        config: DraftConfig,
        registry: Arc<PersistenceRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            adapter: StorageAdapter::new(backend, config.storage_ceiling_bytes),
            codec: DraftCodec::new(config.format_version.clone(), config.expiry()),
            registry,
            events,
            config,
        }
    }

    pub fn config(&self) -> &DraftConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PersistenceRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Build a key, substituting the anonymous user when `user_id` is absent.
    pub fn key(
        &self,
        form_type: FormType,
        course_id: &str,
        lesson_id: &str,
        user_id: Option<&str>,
    ) -> StorageKey {
        let user = user_id
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.config.anonymous_user);
        StorageKey::new(form_type, course_id, lesson_id, user)
    }

    pub fn render_key(&self, key: &StorageKey) -> String {
        key.render(&self.config.namespace)
    }

    fn prefix(&self) -> String {
        format!("{}_", self.config.namespace)
    }

    /// Startup pass: optionally sweep expired drafts, then rebuild the
    /// registry from storage. Returns the number of drafts indexed.
    pub async fn bootstrap(&self) -> usize {
        if !self.adapter.is_available().await {
            tracing::warn!("draft storage unavailable at startup, running in memory only");
            self.registry.rebuild(Vec::new());
            self.events.publish(DraftEvent::StorageUnavailable);
            return 0;
        }

        if self.config.cleanup_on_start {
            self.cleanup_expired().await;
        }

        let now = Utc::now();
        let mut entries = Vec::new();
        for raw_key in self.adapter.keys_with_prefix(&self.prefix()).await {
            let Some(raw) = self.adapter.read(&raw_key).await else {
                continue;
            };
            if let Some(record) = self.codec.decode(&raw, now) {
                entries.push(DraftMetadata::from_record(raw_key, &record));
            }
        }

        let count = entries.len();
        self.registry.rebuild(entries);
        tracing::info!(drafts = count, "draft registry initialized");
        count
    }

    /// Validate and persist `payload` under `key`.
    ///
    /// On a quota miss, expired drafts are evicted and the write retried
    /// once. The outcome is mirrored into the key's auto-save status.
    pub async fn save(&self, key: &StorageKey, payload: &FormData) -> Result<DateTime<Utc>, DraftError> {
        let raw_key = self.render_key(key);
        self.registry.begin_save(&raw_key);

        match self.write_draft(key, &raw_key, payload).await {
            Ok(saved_at) => {
                self.registry.finish_save(&raw_key, saved_at);
                self.events.publish(DraftEvent::Saved {
                    key: raw_key,
                    saved_at,
                });
                Ok(saved_at)
            }
            Err(err) => {
                tracing::warn!(key = %raw_key, error = %err, "draft save refused");
                self.registry.fail_save(&raw_key, &err.to_string());
                if err.is_notifiable() {
                    let notice = match &err {
                        DraftError::Quota {
                            required,
                            available,
                        } => DraftEvent::QuotaExceeded {
                            key: raw_key.clone(),
                            required: *required,
                            available: *available,
                        },
                        _ => DraftEvent::StorageUnavailable,
                    };
                    self.events.publish(notice);
                }
                self.events.publish(DraftEvent::SaveFailed {
                    key: raw_key,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn write_draft(
        &self,
        key: &StorageKey,
        raw_key: &str,
        payload: &FormData,
    ) -> Result<DateTime<Utc>, DraftError> {
        validator::check(&key.form_type, payload)?;

        if !self.adapter.is_available().await {
            return Err(DraftError::StorageUnavailable);
        }

        let (raw, record) = self
            .codec
            .encode(payload, Utc::now())
            .ok_or_else(|| DraftError::Serialization("payload could not be encoded".into()))?;

        let mut required = self.growth(raw_key, &raw).await;
        if !self.adapter.will_fit(required).await {
            tracing::debug!(key = raw_key, bytes = required, "draft over quota, evicting expired drafts");
            self.cleanup_expired().await;
            required = self.growth(raw_key, &raw).await;
            if !self.adapter.will_fit(required).await {
                return Err(DraftError::Quota {
                    required,
                    available: self.adapter.available_bytes().await,
                });
            }
        }

        if !self.adapter.write(raw_key, &raw).await {
            return Err(DraftError::Storage(format!("backend refused write to '{raw_key}'")));
        }

        self.registry
            .upsert(DraftMetadata::from_record(raw_key, &record));
        tracing::debug!(key = raw_key, bytes = raw.len(), "draft saved");
        Ok(record.saved_at)
    }

    /// Net bytes a write of `raw` under `raw_key` adds to the store.
    async fn growth(&self, raw_key: &str, raw: &str) -> u64 {
        let new_size = (raw_key.len() + raw.len()) as u64;
        let old_size = self
            .adapter
            .read(raw_key)
            .await
            .map_or(0, |old| (raw_key.len() + old.len()) as u64);
        new_size.saturating_sub(old_size)
    }

    /// Read the draft under `key`.
    ///
    /// Malformed, outdated, expired or structurally invalid records are
    /// deleted and reported as absent.
    pub async fn load(&self, key: &StorageKey) -> Result<Option<LoadedDraft>, DraftError> {
        if !self.adapter.is_available().await {
            return Err(DraftError::StorageUnavailable);
        }

        let raw_key = self.render_key(key);
        let Some(raw) = self.adapter.read(&raw_key).await else {
            self.registry.forget(&raw_key);
            return Ok(None);
        };

        let record = match self.codec.inspect(&raw, Utc::now()) {
            Ok(record) => record,
            Err(rejection) => {
                let err = DraftError::from(rejection);
                tracing::warn!(key = %raw_key, error = %err, "discarding unreadable draft");
                self.purge(&raw_key).await;
                return Ok(None);
            }
        };

        if let Err(e) = validator::check(&key.form_type, &record.payload) {
            tracing::warn!(key = %raw_key, error = %e, "discarding invalid draft");
            self.purge(&raw_key).await;
            return Ok(None);
        }

        self.registry
            .upsert(DraftMetadata::from_record(raw_key.as_str(), &record));
        Ok(Some(LoadedDraft {
            payload: record.payload,
            saved_at: record.saved_at,
        }))
    }

    /// Delete the draft under `key`. Idempotent; false only when the
    /// backend itself failed.
    pub async fn remove(&self, key: &StorageKey) -> bool {
        let raw_key = self.render_key(key);
        self.purge(&raw_key).await
    }

    async fn purge(&self, raw_key: &str) -> bool {
        if !self.adapter.remove(raw_key).await {
            return false;
        }
        self.registry.forget(raw_key);
        self.events.publish(DraftEvent::Removed {
            key: raw_key.to_string(),
        });
        true
    }

    /// Delete every draft whose envelope is malformed, outdated or expired.
    /// Returns the number removed; all other records are left untouched.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for raw_key in self.adapter.keys_with_prefix(&self.prefix()).await {
            let Some(raw) = self.adapter.read(&raw_key).await else {
                continue;
            };
            if let Err(rejection) = self.codec.inspect(&raw, now) {
                tracing::debug!(key = %raw_key, reason = %rejection, "evicting draft");
                if self.purge(&raw_key).await {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "expired drafts cleaned up");
        }
        self.events.publish(DraftEvent::CleanupCompleted { removed });
        removed
    }

    /// Keys of every draft in a course/lesson/user scope, any form type.
    pub async fn list_keys_for_scope(
        &self,
        course_id: &str,
        lesson_id: &str,
        user_id: &str,
    ) -> Vec<StorageKey> {
        self.adapter
            .keys_with_prefix(&self.prefix())
            .await
            .iter()
            .filter_map(|raw| StorageKey::parse(&self.config.namespace, raw))
            .filter(|k| k.in_scope(course_id, lesson_id, user_id))
            .collect()
    }

    /// Remove every draft in a scope. Returns the number removed.
    pub async fn remove_scope(&self, course_id: &str, lesson_id: &str, user_id: &str) -> usize {
        let mut removed = 0;
        for key in self.list_keys_for_scope(course_id, lesson_id, user_id).await {
            if self.remove(&key).await {
                removed += 1;
            }
        }
        tracing::info!(course_id, lesson_id, removed, "drafts purged for scope");
        removed
    }

    pub async fn storage_info(&self) -> StorageInfo {
        let available = self.adapter.is_available().await;
        StorageInfo {
            available,
            used_bytes: self.adapter.usage_bytes().await,
            ceiling_bytes: self.adapter.ceiling_bytes(),
            draft_count: self.adapter.keys_with_prefix(&self.prefix()).await.len(),
        }
    }
}
