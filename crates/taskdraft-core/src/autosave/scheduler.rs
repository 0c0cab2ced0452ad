//! Debounced auto-save for one editing session.
//!
//! Every change re-arms a single timer; only when the timer survives the
//! full debounce window does the current form data get written through
//! the draft store. Each armed timer owns a child `CancellationToken` of
//! the scheduler's shutdown token, so re-arming, suspending and closing
//! all cancel by token rather than by aborting tasks. A save that has
//! started is never cancelled.
//!
//! At most one save per session is in flight. A timer that fires while a
//! save is running only records that another pass is wanted; when the
//! running save finishes, the working copy is compared against what was
//! last saved and the timer is re-armed if they differ.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskdraft_types::draft::{AutoSaveStatus, StorageKey};
use taskdraft_types::error::DraftError;
use taskdraft_types::form::FormData;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::draft::DraftStore;
use crate::storage::KeyValueBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing scheduled.
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// A save is in flight.
    Saving,
}

struct Inner {
    current: FormData,
    /// Fingerprint of the last payload the store accepted.
    last_saved: Option<String>,
    timer: Option<CancellationToken>,
    in_flight: bool,
    resave_requested: bool,
    suspended: bool,
}

impl Inner {
    fn is_dirty(&self) -> bool {
        self.last_saved.as_deref() != Some(self.current.fingerprint().as_str())
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }
}

struct Shared<B> {
    store: Arc<DraftStore<B>>,
    key: StorageKey,
    debounce: Duration,
    inner: Mutex<Inner>,
    /// Only written while `inner` is locked.
    state: watch::Sender<SchedulerState>,
    shutdown: CancellationToken,
}

impl<B: KeyValueBackend + 'static> Shared<B> {
    fn arm(self: &Arc<Self>, inner: &mut Inner) {
        inner.cancel_timer();
        if inner.suspended || self.shutdown.is_cancelled() {
            if !inner.in_flight {
                self.state.send_replace(SchedulerState::Idle);
            }
            return;
        }

        let token = self.shutdown.child_token();
        inner.timer = Some(token.clone());
        if !inner.in_flight {
            self.state.send_replace(SchedulerState::Pending);
        }
        tracing::trace!(key = ?self.key, "auto-save armed");

        let shared = Arc::clone(self);
        let debounce = self.debounce;
        tokio::spawn(async move {
            let fired = tokio::select! {
                () = token.cancelled() => false,
                () = tokio::time::sleep(debounce) => true,
            };
            if fired {
                shared.fire(&token).await;
            }
        });
    }

    async fn fire(self: &Arc<Self>, token: &CancellationToken) {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if token.is_cancelled() || inner.suspended {
                return;
            }
            inner.timer = None;
            if !inner.is_dirty() {
                if !inner.in_flight {
                    self.state.send_replace(SchedulerState::Idle);
                }
                return;
            }
            match self.begin_flight(&mut inner) {
                Some(snapshot) => snapshot,
                None => return,
            }
        };
        if let Err(e) = self.complete_flight(snapshot).await {
            tracing::debug!(key = ?self.key, error = %e, "debounced auto-save failed");
        }
    }

    /// Claim the in-flight slot, or queue a re-run if it is taken.
    fn begin_flight(&self, inner: &mut Inner) -> Option<FormData> {
        if inner.in_flight {
            inner.resave_requested = true;
            tracing::debug!(key = ?self.key, "save already in flight, queueing another pass");
            return None;
        }
        inner.in_flight = true;
        self.state.send_replace(SchedulerState::Saving);
        Some(inner.current.clone())
    }

    async fn complete_flight(self: &Arc<Self>, snapshot: FormData) -> Result<DateTime<Utc>, DraftError> {
        let fingerprint = snapshot.fingerprint();
        let result = self.store.save(&self.key, &snapshot).await;

        let mut inner = self.inner.lock().await;
        inner.in_flight = false;
        if result.is_ok() {
            inner.last_saved = Some(fingerprint);
        }

        let rerun = std::mem::take(&mut inner.resave_requested);
        if !inner.is_dirty() {
            inner.cancel_timer();
            self.state.send_replace(SchedulerState::Idle);
        } else if rerun {
            self.arm(&mut inner);
        } else if inner.timer.is_some() {
            self.state.send_replace(SchedulerState::Pending);
        } else {
            self.state.send_replace(SchedulerState::Idle);
        }
        result
    }
}

/// Per-session debounced writer into a [`DraftStore`].
pub struct AutoSaveScheduler<B: KeyValueBackend + 'static> {
    shared: Arc<Shared<B>>,
}

impl<B: KeyValueBackend + 'static> AutoSaveScheduler<B> {
    /// Create a scheduler using the store's configured debounce delay.
    ///
    /// `baseline` is the content considered already persisted: the fresh
    /// template or the recovered draft. It is not saved until it changes.
    pub fn new(store: Arc<DraftStore<B>>, key: StorageKey, baseline: &FormData) -> Self {
        let debounce = store.config().debounce();
        Self::with_debounce(store, key, baseline, debounce)
    }

    pub fn with_debounce(
        store: Arc<DraftStore<B>>,
        key: StorageKey,
        baseline: &FormData,
        debounce: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let inner = Inner {
            current: baseline.clone(),
            last_saved: Some(baseline.fingerprint()),
            timer: None,
            in_flight: false,
            resave_requested: false,
            suspended: false,
        };
        Self {
            shared: Arc::new(Shared {
                store,
                key,
                debounce,
                inner: Mutex::new(inner),
                state,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.shared.key
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    /// Watch scheduler state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }

    /// Auto-save indicator for this session's key. Registry lookup only.
    pub fn status(&self) -> AutoSaveStatus {
        let store = &self.shared.store;
        store.registry().status(&store.render_key(&self.shared.key))
    }

    /// Whether the working copy differs from what was last saved.
    pub async fn is_dirty(&self) -> bool {
        self.shared.inner.lock().await.is_dirty()
    }

    /// Record new form data and (re)arm the debounce timer if it differs
    /// from the last saved content.
    pub async fn on_change(&self, data: FormData) {
        let mut inner = self.shared.inner.lock().await;
        inner.current = data;
        if inner.is_dirty() {
            self.shared.arm(&mut inner);
            return;
        }

        inner.cancel_timer();
        if !inner.in_flight {
            self.shared.state.send_replace(SchedulerState::Idle);
        }
    }

    /// Save immediately, skipping the debounce.
    ///
    /// Returns `Ok(None)` when a save is already in flight (another pass
    /// is queued to run after it) or the scheduler is closed.
    pub async fn save_now(&self) -> Result<Option<DateTime<Utc>>, DraftError> {
        if self.shared.shutdown.is_cancelled() {
            return Ok(None);
        }
        let snapshot = {
            let mut inner = self.shared.inner.lock().await;
            inner.cancel_timer();
            match self.shared.begin_flight(&mut inner) {
                Some(snapshot) => snapshot,
                None => return Ok(None),
            }
        };
        self.shared.complete_flight(snapshot).await.map(Some)
    }

    /// Stop scheduling saves and wait for any in-flight save to finish.
    pub async fn suspend(&self) {
        let mut rx = self.shared.state.subscribe();
        {
            let mut inner = self.shared.inner.lock().await;
            inner.suspended = true;
            inner.resave_requested = false;
            inner.cancel_timer();
            if !inner.in_flight {
                self.shared.state.send_replace(SchedulerState::Idle);
            }
        }
        let _ = rx.wait_for(|s| *s != SchedulerState::Saving).await;
    }

    /// Undo [`suspend`](Self::suspend), re-arming if there are unsaved edits.
    pub async fn resume(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.suspended = false;
        if inner.is_dirty() {
            self.shared.arm(&mut inner);
        }
    }

    /// Replace the working copy and treat it as already persisted.
    pub async fn reset(&self, baseline: &FormData) {
        let mut inner = self.shared.inner.lock().await;
        inner.cancel_timer();
        inner.resave_requested = false;
        inner.current = baseline.clone();
        inner.last_saved = Some(baseline.fingerprint());
        if !inner.in_flight {
            self.shared.state.send_replace(SchedulerState::Idle);
        }
    }

    /// Cancel any pending timer for good. In-flight saves still complete.
    pub fn close(&self) {
        self.shared.shutdown.cancel();
    }
}

impl<B: KeyValueBackend + 'static> Drop for AutoSaveScheduler<B> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use taskdraft_types::config::DraftConfig;
    use taskdraft_types::draft::AutoSavePhase;
    use taskdraft_types::error::StorageError;
    use taskdraft_types::form::FormType;
    use tokio::sync::Semaphore;
    use tokio::time::sleep;

    use super::*;
    use crate::draft::PersistenceRegistry;
    use crate::event::EventBus;
    use crate::storage::MemoryBackend;

    const TICK: Duration = Duration::from_millis(100);
    const SETTLE: Duration = Duration::from_millis(600);

    fn new_store<B: KeyValueBackend>(backend: B) -> Arc<DraftStore<B>> {
        Arc::new(DraftStore::new(
            backend,
            DraftConfig::default(),
            Arc::new(PersistenceRegistry::new()),
            EventBus::new(64),
        ))
    }

    fn key() -> StorageKey {
        StorageKey::new(FormType::TrueFalse, "c1", "l1", "u1")
    }

    fn form(title: &str) -> FormData {
        FormData::new(json!({
            "title": title,
            "type": "trueFalse",
            "questions": [{"id": "q1", "correctAnswer": true}],
            "courseId": "c1",
            "lessonId": "l1"
        }))
    }

    fn stored_title(backend: &MemoryBackend, raw_key: &str) -> Option<String> {
        let raw = backend.raw(raw_key)?;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        value["data"]["title"].as_str().map(str::to_string)
    }

    /// Backend whose draft writes block until the gate is opened.
    #[derive(Clone)]
    struct GatedBackend {
        inner: MemoryBackend,
        gate: Arc<Semaphore>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl GatedBackend {
        fn closed() -> Self {
            Self {
                inner: MemoryBackend::new(),
                gate: Arc::new(Semaphore::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl KeyValueBackend for GatedBackend {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key.starts_with("task_draft_") {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                let permit = self.gate.acquire().await;
                drop(permit);
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key).await
        }

        async fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys().await
        }

        async fn total_bytes(&self) -> Result<u64, StorageError> {
            self.inner.total_bytes().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_save() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        for i in 0..5 {
            scheduler.on_change(form(&format!("draft {i}"))).await;
            assert_eq!(scheduler.state(), SchedulerState::Pending);
            sleep(TICK).await;
        }
        assert_eq!(backend.write_count(&raw_key), 0);

        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 1);
        assert_eq!(stored_title(&backend, &raw_key).as_deref(), Some("draft 4"));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.is_dirty().await);
        assert_eq!(scheduler.status().phase(), AutoSavePhase::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_content_is_not_saved() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form("same"));

        scheduler.on_change(form("same")).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reverting_an_edit_cancels_the_pending_save() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form("original"));

        scheduler.on_change(form("changed")).await;
        scheduler.on_change(form("original")).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_bypasses_debounce() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("now")).await;
        let saved_at = scheduler.save_now().await.unwrap();
        assert!(saved_at.is_some());
        assert_eq!(backend.write_count(&raw_key), 1);

        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_during_a_save_trigger_exactly_one_follow_up() {
        let backend = GatedBackend::closed();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("first")).await;
        sleep(SETTLE).await;
        assert_eq!(scheduler.state(), SchedulerState::Saving);

        scheduler.on_change(form("second")).await;
        sleep(SETTLE).await;
        assert_eq!(scheduler.save_now().await, Ok(None));
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(backend.inner.write_count(&raw_key), 0);

        backend.gate.add_permits(100);
        sleep(SETTLE).await;

        assert_eq!(backend.inner.write_count(&raw_key), 2);
        assert_eq!(stored_title(&backend.inner, &raw_key).as_deref(), Some("second"));
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_reverted_to_the_in_flight_content_are_not_saved_again() {
        let backend = GatedBackend::closed();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("A")).await;
        sleep(SETTLE).await;
        assert_eq!(scheduler.state(), SchedulerState::Saving);

        // Re-arms while "A" is still being written
        scheduler.on_change(form("B")).await;
        scheduler.on_change(form("A")).await;

        backend.gate.add_permits(100);
        sleep(TICK).await;
        assert_eq!(backend.inner.write_count(&raw_key), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.is_dirty().await);

        sleep(SETTLE).await;
        assert_eq!(backend.inner.write_count(&raw_key), 1);
        assert_eq!(stored_title(&backend.inner, &raw_key).as_deref(), Some("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_keeps_last_saved_and_stays_dirty() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("ok")).await;
        sleep(SETTLE).await;
        let first = scheduler.status().last_saved;
        assert!(first.is_some());

        backend.set_available(false);
        scheduler.on_change(form("lost")).await;
        sleep(SETTLE).await;

        let status = scheduler.status();
        assert_eq!(status.phase(), AutoSavePhase::Errored);
        assert_eq!(status.last_saved, first);
        assert!(scheduler.is_dirty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_holds_saves_until_resume() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("held")).await;
        scheduler.suspend().await;
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 0);

        scheduler.resume().await;
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_timer() {
        let backend = MemoryBackend::new();
        let store = new_store(backend.clone());
        let raw_key = store.render_key(&key());
        let scheduler = AutoSaveScheduler::new(store, key(), &form(""));

        scheduler.on_change(form("discarded")).await;
        scheduler.close();
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 0);

        scheduler.on_change(form("after close")).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        sleep(SETTLE).await;
        assert_eq!(backend.write_count(&raw_key), 0);
    }
}
