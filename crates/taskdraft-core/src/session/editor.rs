//! One editing session over a task-authoring form.
//!
//! Opening a session runs the recovery check, then hands the working copy
//! to an auto-save scheduler. Submitting calls the remote task service and,
//! on success, purges every draft in the course/lesson scope so no stale
//! recovery prompt appears for work that was already published.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskdraft_types::draft::{AutoSaveStatus, StorageKey};
use taskdraft_types::error::{DraftError, TaskError};
use taskdraft_types::form::FormData;
use taskdraft_types::task::TaskRecord;
use uuid::Uuid;

use crate::autosave::AutoSaveScheduler;
use crate::draft::DraftStore;
use crate::recovery::{
    RecoveryController, RecoveryDecision, RecoveryError, RecoveryNotice, RecoveryOutcome,
    RecoveryState,
};
use crate::storage::KeyValueBackend;
use crate::task::TaskCreator;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("task creation failed: {0}")]
    Task(#[from] TaskError),

    #[error("session was already submitted")]
    AlreadySubmitted,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub task: TaskRecord,
    pub drafts_purged: usize,
}

pub struct EditingSession<B: KeyValueBackend + 'static> {
    id: Uuid,
    store: Arc<DraftStore<B>>,
    key: StorageKey,
    template: FormData,
    working: FormData,
    recovery: RecoveryController<B>,
    autosave: AutoSaveScheduler<B>,
    submitted: bool,
}

impl<B: KeyValueBackend + 'static> EditingSession<B> {
    /// Start a session: check for a recoverable draft, then begin
    /// auto-saving from whichever data the session starts with.
    pub async fn open(store: Arc<DraftStore<B>>, key: StorageKey, template: FormData) -> Self {
        let mut recovery = RecoveryController::new(Arc::clone(&store), key.clone());
        let outcome = recovery
            .check(&template)
            .await
            .unwrap_or_else(|_| RecoveryOutcome::Fresh(template.clone()));
        let working = outcome.form_data().clone();
        let autosave = AutoSaveScheduler::new(Arc::clone(&store), key.clone(), &working);

        let id = Uuid::now_v7();
        tracing::debug!(session = %id, key = ?key, recovered = recovery.notice().is_some(), "editing session opened");

        Self {
            id,
            store,
            key,
            template,
            working,
            recovery,
            autosave,
            submitted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn form_data(&self) -> &FormData {
        &self.working
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery.state()
    }

    pub fn recovery_notice(&self) -> Option<&RecoveryNotice> {
        self.recovery.notice()
    }

    /// Passive auto-save indicator for this session.
    pub fn status(&self) -> AutoSaveStatus {
        self.autosave.status()
    }

    /// Accept the recovered draft and dismiss the notice.
    pub async fn keep_recovered(&mut self) -> Result<(), RecoveryError> {
        self.recovery.resolve(RecoveryDecision::Keep).await
    }

    /// Drop the recovered draft and restart from the template.
    pub async fn discard_recovered(&mut self) -> Result<(), RecoveryError> {
        self.autosave.suspend().await;
        let result = self.recovery.resolve(RecoveryDecision::Discard).await;
        if result.is_ok() {
            self.working = self.template.clone();
            self.autosave.reset(&self.working).await;
        }
        self.autosave.resume().await;
        result
    }

    /// Replace the working copy.
    pub async fn update(&mut self, data: FormData) {
        self.working = data;
        if !self.submitted {
            self.autosave.on_change(self.working.clone()).await;
        }
    }

    /// Mutate the working copy in place.
    pub async fn edit(&mut self, f: impl FnOnce(&mut FormData)) {
        let mut data = self.working.clone();
        f(&mut data);
        self.update(data).await;
    }

    /// Explicit "save now".
    pub async fn save_now(&self) -> Result<Option<DateTime<Utc>>, DraftError> {
        self.autosave.save_now().await
    }

    /// Publish the form through `creator`; on success purge every draft in
    /// this course/lesson/user scope. On failure drafts and auto-save are
    /// left running so no edits are lost.
    pub async fn submit<T: TaskCreator>(&mut self, creator: &T) -> Result<SubmitReceipt, SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        self.autosave.suspend().await;
        let key = &self.key;
        match creator
            .create_task(&key.course_id, &key.lesson_id, &self.working)
            .await
        {
            Ok(task) => {
                let drafts_purged = self
                    .store
                    .remove_scope(&key.course_id, &key.lesson_id, &key.user_id)
                    .await;
                self.submitted = true;
                self.autosave.close();
                tracing::info!(session = %self.id, task_id = %task.id, drafts_purged, "form submitted");
                Ok(SubmitReceipt {
                    task,
                    drafts_purged,
                })
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "form submission failed, keeping drafts");
                self.autosave.resume().await;
                Err(e.into())
            }
        }
    }

    /// End the session without saving pending edits.
    pub fn close(self) {
        self.autosave.close();
        tracing::debug!(session = %self.id, "editing session closed");
    }
}
