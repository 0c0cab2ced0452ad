//! SQLite key-value backend.
//!
//! Implements `KeyValueBackend` from `taskdraft-core` on a single
//! `draft_storage` table. Values are opaque text; the draft codec owns
//! their format.

use chrono::Utc;
use sqlx::Row;
use taskdraft_core::storage::KeyValueBackend;
use taskdraft_types::error::StorageError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KeyValueBackend`.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: DatabasePool,
}

impl SqliteBackend {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

fn storage_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StorageError::Unavailable,
        sqlx::Error::Database(db) if db.message().contains("database or disk is full") => {
            StorageError::QuotaExceeded
        }
        other => StorageError::Io(other.to_string()),
    }
}

impl KeyValueBackend for SqliteBackend {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM draft_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(storage_error)?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(storage_error)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"INSERT INTO draft_storage (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM draft_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT key FROM draft_storage ORDER BY key")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(storage_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)
    }

    async fn total_bytes(&self) -> Result<u64, StorageError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) AS total FROM draft_storage",
        )
        .fetch_one(&self.pool.reader)
        .await
        .map_err(storage_error)?;

        let total: i64 = row.try_get("total").map_err(storage_error)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use taskdraft_core::draft::{DraftStore, PersistenceRegistry};
    use taskdraft_core::event::EventBus;
    use taskdraft_types::config::DraftConfig;
    use taskdraft_types::draft::StorageKey;
    use taskdraft_types::form::{FormData, FormType};

    use super::*;
    use crate::sqlite::pool::database_url;

    async fn test_backend() -> (SqliteBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        (SqliteBackend::new(pool), dir)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (backend, _dir) = test_backend().await;

        backend.set_item("k1", "hello").await.unwrap();
        assert_eq!(backend.get_item("k1").await.unwrap(), Some("hello".to_string()));
        assert_eq!(backend.get_item("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (backend, _dir) = test_backend().await;

        backend.set_item("k1", "first").await.unwrap();
        backend.set_item("k1", "second").await.unwrap();

        assert_eq!(backend.get_item("k1").await.unwrap(), Some("second".to_string()));
        assert_eq!(backend.keys().await.unwrap(), vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn test_remove() {
        let (backend, _dir) = test_backend().await;

        backend.set_item("k1", "v").await.unwrap();
        backend.remove_item("k1").await.unwrap();
        backend.remove_item("never-existed").await.unwrap();

        assert!(backend.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_bytes_counts_utf8() {
        let (backend, _dir) = test_backend().await;
        assert_eq!(backend.total_bytes().await.unwrap(), 0);

        backend.set_item("ab", "cde").await.unwrap();
        backend.set_item("é", "").await.unwrap();

        assert_eq!(backend.total_bytes().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let (backend, _dir) = test_backend().await;
        backend.pool().close().await;

        assert_eq!(backend.keys().await, Err(StorageError::Unavailable));
    }

    #[tokio::test]
    async fn test_drafts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path());
        let key = StorageKey::new(FormType::MultipleChoice, "c1", "l1", "u1");
        let mut data = FormData::template(&FormType::MultipleChoice, "c1", "l1");
        data.set("title", json!("Persisted"));

        {
            let pool = DatabasePool::new(&url).await.unwrap();
            let store = DraftStore::new(
                SqliteBackend::new(pool.clone()),
                DraftConfig::default(),
                Arc::new(PersistenceRegistry::new()),
                EventBus::new(8),
            );
            store.save(&key, &data).await.unwrap();
            pool.close().await;
        }

        let pool = DatabasePool::new(&url).await.unwrap();
        let store = DraftStore::new(
            SqliteBackend::new(pool),
            DraftConfig::default(),
            Arc::new(PersistenceRegistry::new()),
            EventBus::new(8),
        );
        assert_eq!(store.bootstrap().await, 1);
        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded.payload.title(), Some("Persisted"));
    }
}
