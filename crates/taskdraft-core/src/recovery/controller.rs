//! Draft recovery at editing-session start.
//!
//! Before normal editing begins, the controller looks for a stored draft
//! under the session's key. A found draft is never silently applied: the
//! controller raises a `RecoveryAvailable` event and waits for the user to
//! keep it or discard it.
//!
//! `Unchecked -> Notified -> Resolved`, or straight to `Resolved` when
//! there is nothing to recover. `Resolved` is terminal for the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskdraft_types::draft::StorageKey;
use taskdraft_types::error::DraftError;
use taskdraft_types::event::DraftEvent;
use taskdraft_types::form::{FormData, FormType};

use crate::draft::DraftStore;
use crate::storage::KeyValueBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Unchecked,
    Notified,
    Resolved,
}

/// What the user is told about a recoverable draft.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryNotice {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub form_type: FormType,
}

/// Result of the start-of-session check.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// No usable draft; edit the template.
    Fresh(FormData),
    /// A draft was found and merged over the template.
    Recovered {
        data: FormData,
        notice: RecoveryNotice,
    },
}

impl RecoveryOutcome {
    pub fn form_data(&self) -> &FormData {
        match self {
            RecoveryOutcome::Fresh(data) => data,
            RecoveryOutcome::Recovered { data, .. } => data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Keep editing the recovered draft.
    Keep,
    /// Throw the draft away and start from the template.
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    #[error("recovery already checked for this session")]
    AlreadyChecked,

    #[error("no recovery notice is pending")]
    NothingPending,
}

pub struct RecoveryController<B> {
    store: Arc<DraftStore<B>>,
    key: StorageKey,
    state: RecoveryState,
    notice: Option<RecoveryNotice>,
}

impl<B: KeyValueBackend> RecoveryController<B> {
    pub fn new(store: Arc<DraftStore<B>>, key: StorageKey) -> Self {
        Self {
            store,
            key,
            state: RecoveryState::Unchecked,
            notice: None,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// The pending notice, while the user has not decided yet.
    pub fn notice(&self) -> Option<&RecoveryNotice> {
        self.notice.as_ref()
    }

    /// Look for a stored draft and decide the session's starting data.
    ///
    /// Storage failures degrade to a fresh start; editing is never blocked.
    pub async fn check(&mut self, template: &FormData) -> Result<RecoveryOutcome, RecoveryError> {
        if self.state != RecoveryState::Unchecked {
            return Err(RecoveryError::AlreadyChecked);
        }

        let loaded = match self.store.load(&self.key).await {
            Ok(loaded) => loaded,
            Err(DraftError::StorageUnavailable) => {
                tracing::debug!("draft storage unavailable, starting fresh");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "draft recovery check failed, starting fresh");
                None
            }
        };

        let Some(draft) = loaded else {
            self.state = RecoveryState::Resolved;
            return Ok(RecoveryOutcome::Fresh(template.clone()));
        };

        let notice = RecoveryNotice {
            key: self.store.render_key(&self.key),
            timestamp: draft.saved_at,
            form_type: self.key.form_type.clone(),
        };
        self.store.events().publish(DraftEvent::RecoveryAvailable {
            key: notice.key.clone(),
            timestamp: notice.timestamp,
            form_type: notice.form_type.clone(),
        });
        tracing::info!(key = %notice.key, saved_at = %notice.timestamp, "recoverable draft found");

        self.state = RecoveryState::Notified;
        self.notice = Some(notice.clone());
        Ok(RecoveryOutcome::Recovered {
            data: draft.payload.merged_over(template),
            notice,
        })
    }

    /// Apply the user's decision on a pending notice.
    pub async fn resolve(&mut self, decision: RecoveryDecision) -> Result<(), RecoveryError> {
        if self.state != RecoveryState::Notified {
            return Err(RecoveryError::NothingPending);
        }

        if decision == RecoveryDecision::Discard && !self.store.remove(&self.key).await {
            tracing::warn!(key = ?self.key, "failed to remove discarded draft");
        }
        tracing::info!(key = ?self.key, ?decision, "draft recovery resolved");

        self.notice = None;
        self.state = RecoveryState::Resolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::PersistenceRegistry;
    use crate::event::EventBus;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use taskdraft_types::config::DraftConfig;

    fn setup() -> (Arc<DraftStore<MemoryBackend>>, MemoryBackend, StorageKey) {
        let backend = MemoryBackend::new();
        let store = Arc::new(DraftStore::new(
            backend.clone(),
            DraftConfig::default(),
            Arc::new(PersistenceRegistry::new()),
            EventBus::new(16),
        ));
        let key = StorageKey::new(FormType::FillInBlanks, "c1", "l1", "u1");
        (store, backend, key)
    }

    fn template() -> FormData {
        let mut t = FormData::template(&FormType::FillInBlanks, "c1", "l1");
        t.set("timeLimit", json!(60));
        t
    }

    fn saved_draft() -> FormData {
        FormData::new(json!({
            "title": "Recovered",
            "type": "fillInBlanks",
            "questions": [{"id": "q1", "blanks": [{"id": "b1"}]}],
            "courseId": "c1",
            "lessonId": "l1"
        }))
    }

    #[tokio::test]
    async fn no_draft_resolves_immediately() {
        let (store, _, key) = setup();
        let mut controller = RecoveryController::new(store, key);

        let outcome = controller.check(&template()).await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::Fresh(template()));
        assert_eq!(controller.state(), RecoveryState::Resolved);
        assert_eq!(
            controller.resolve(RecoveryDecision::Keep).await,
            Err(RecoveryError::NothingPending)
        );
    }

    #[tokio::test]
    async fn found_draft_notifies_and_merges_over_template() {
        let (store, _, key) = setup();
        let saved_at = store.save(&key, &saved_draft()).await.unwrap();
        let mut events = store.events().subscribe();
        let mut controller = RecoveryController::new(store, key);

        let outcome = controller.check(&template()).await.unwrap();
        let RecoveryOutcome::Recovered { data, notice } = outcome else {
            panic!("expected a recovered draft");
        };
        assert_eq!(data.title(), Some("Recovered"));
        assert_eq!(data.get("timeLimit"), Some(&json!(60)));
        assert_eq!(notice.timestamp, saved_at);
        assert_eq!(notice.form_type, FormType::FillInBlanks);
        assert_eq!(controller.state(), RecoveryState::Notified);

        assert!(matches!(
            events.recv().await.unwrap(),
            DraftEvent::RecoveryAvailable { .. }
        ));
    }

    #[tokio::test]
    async fn keep_leaves_draft_in_place() {
        let (store, backend, key) = setup();
        store.save(&key, &saved_draft()).await.unwrap();
        let raw_key = store.render_key(&key);
        let mut controller = RecoveryController::new(store, key);

        controller.check(&template()).await.unwrap();
        controller.resolve(RecoveryDecision::Keep).await.unwrap();

        assert_eq!(controller.state(), RecoveryState::Resolved);
        assert!(controller.notice().is_none());
        assert!(backend.raw(&raw_key).is_some());
    }

    #[tokio::test]
    async fn discard_removes_draft() {
        let (store, backend, key) = setup();
        store.save(&key, &saved_draft()).await.unwrap();
        let raw_key = store.render_key(&key);
        let mut controller = RecoveryController::new(store.clone(), key);

        controller.check(&template()).await.unwrap();
        controller.resolve(RecoveryDecision::Discard).await.unwrap();

        assert!(backend.raw(&raw_key).is_none());
        assert!(!store.registry().has_draft(&raw_key));
    }

    #[tokio::test]
    async fn check_runs_once_per_session() {
        let (store, _, key) = setup();
        let mut controller = RecoveryController::new(store, key);
        controller.check(&template()).await.unwrap();
        assert_eq!(
            controller.check(&template()).await,
            Err(RecoveryError::AlreadyChecked)
        );
    }

    #[tokio::test]
    async fn unavailable_storage_starts_fresh() {
        let (store, backend, key) = setup();
        backend.set_available(false);
        let mut controller = RecoveryController::new(store, key);
        let outcome = controller.check(&template()).await.unwrap();
        assert!(matches!(outcome, RecoveryOutcome::Fresh(_)));
    }
}
