//! Application state wiring the draft store to its SQLite backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use taskdraft_core::draft::{DraftStore, PersistenceRegistry};
use taskdraft_core::event::EventBus;
use taskdraft_infra::config::load_config;
use taskdraft_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use taskdraft_infra::sqlite::kv::SqliteBackend;
use taskdraft_infra::sqlite::pool::{DatabasePool, database_url};
use taskdraft_types::config::AppConfig;

/// Draft store pinned to the SQLite backend.
pub type ConcreteDraftStore = DraftStore<SqliteBackend>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConcreteDraftStore>,
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Open the database, load config and rebuild the draft registry.
    ///
    /// `sweep_on_start` lets a command that reports on eviction itself
    /// skip the startup sweep.
    pub async fn init(sweep_on_start: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open draft database")?;

        let mut drafts = config.drafts.clone();
        drafts.cleanup_on_start &= sweep_on_start;

        let store = DraftStore::new(
            SqliteBackend::new(db_pool.clone()),
            drafts.clone(),
            PersistenceRegistry::global(),
            EventBus::new(drafts.event_capacity),
        );
        let indexed = store.bootstrap().await;
        tracing::debug!(indexed, data_dir = %data_dir.display(), "app state initialized");

        Ok(Self {
            store: Arc::new(store),
            config,
            data_dir,
            db_pool,
        })
    }
}
