//! Local cache of the last known dataset, for instant first paint.
//!
//! The cache is a single string-keyed entry holding the serialized
//! `{rows, displayColumns[, lineItems]}` snapshot. It has no TTL: an entry is
//! valid until replaced or removed, and staleness is decided structurally by
//! the sync controller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use challan_records::DatasetSnapshot;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

/// Minimal persistent key-value contract (get/set/remove of strings).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// In-memory store.
///
/// Intended for tests and throwaway sessions. Counts writes so callers can
/// assert that unchanged data is not persisted twice.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store mutex poisoned"))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// SQLite-backed key-value store.
///
/// The database is opened lazily on first use; the handle is cheap to clone.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: Option<PathBuf>,
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
}

impl SqliteStore {
    /// Store at the default location (`{data_dir}/challan/cache.db`).
    pub fn new() -> Self {
        Self {
            path: None,
            pool: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Store at an explicit database file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            pool: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        let mut pool_guard = self.pool.lock().await;
        if let Some(pool) = pool_guard.as_ref() {
            return Ok(pool.clone());
        }

        let db_path = match &self.path {
            Some(path) => path.clone(),
            None => cache_db_path().context("failed to determine cache DB path")?,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.to_string_lossy()))
            .context("invalid cache DB path")?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open cache DB at {:?}", db_path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv_store table")?;

        *pool_guard = Some(pool.clone());
        Ok(pool)
    }
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .context("failed to read cache entry")?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to upsert cache entry")?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .context("failed to delete cache entry")?;
        Ok(())
    }
}

/// Resolve the default cache database path: `{app_data_dir}/challan/cache.db`.
fn cache_db_path() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;
    dir.push("challan");
    dir.push("cache.db");
    Ok(dir)
}

/// A cache entry as read back: the exact stored text plus its parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub raw: String,
    pub snapshot: DatasetSnapshot,
}

/// Serialize a snapshot the same way for storage and for staleness checks.
pub fn encode(snapshot: &DatasetSnapshot) -> anyhow::Result<String> {
    serde_json::to_string(snapshot).context("failed to serialize dataset snapshot")
}

/// The dataset cache: one entry under a fixed key.
///
/// Store failures never propagate: reads degrade to "absent" and writes are
/// logged and skipped.
#[derive(Debug, Clone)]
pub struct LocalCache<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the entry; absent, unreadable and corrupted entries are all `None`.
    pub async fn load(&self) -> Option<CachedEntry> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %self.key, "no cache entry");
                return None;
            }
            Err(err) => {
                tracing::warn!(key = %self.key, "failed to read cache: {err:#}");
                return None;
            }
        };

        match serde_json::from_str::<DatasetSnapshot>(&raw) {
            Ok(snapshot) => {
                tracing::debug!(key = %self.key, rows = snapshot.rows.len(), "loaded dataset from cache");
                Some(CachedEntry { raw, snapshot })
            }
            Err(err) => {
                tracing::warn!(key = %self.key, "ignoring corrupted cache entry: {err}");
                None
            }
        }
    }

    /// Replace the entry with already-encoded text.
    pub async fn save_raw(&self, raw: &str) {
        if let Err(err) = self.store.set(&self.key, raw).await {
            tracing::error!(key = %self.key, "failed to write cache: {err:#}");
        }
    }

    pub async fn save(&self, snapshot: &DatasetSnapshot) {
        match encode(snapshot) {
            Ok(raw) => self.save_raw(&raw).await,
            Err(err) => tracing::error!(key = %self.key, "{err:#}"),
        }
    }

    pub async fn invalidate(&self) {
        if let Err(err) = self.store.remove(&self.key).await {
            tracing::error!(key = %self.key, "failed to invalidate cache: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challan_records::Row;

    fn snapshot() -> DatasetSnapshot {
        DatasetSnapshot {
            rows: vec![Row::new().with("code", "X1").with("orderedQty", 10)],
            display_columns: vec!["code".into(), "orderedQty".into()],
            line_items: vec![],
            line_item_columns: vec![],
        }
    }

    #[tokio::test]
    async fn memory_cache_round_trips_snapshot() {
        let cache = LocalCache::new(MemoryStore::new(), "k");
        assert!(cache.load().await.is_none());

        cache.save(&snapshot()).await;
        let entry = cache.load().await.unwrap();
        assert_eq!(entry.snapshot, snapshot());
        assert_eq!(entry.raw, encode(&snapshot()).unwrap());

        cache.invalidate().await;
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn corrupted_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", "{not json").await.unwrap();
        let cache = LocalCache::new(store, "k");
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn stale_shape_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", r#"[{"code":"X1"}]"#).await.unwrap();
        let cache = LocalCache::new(store, "k");
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn sqlite_store_upserts_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::at(dir.path().join("nested").join("cache.db"));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        LocalCache::new(SqliteStore::at(&path), "k").save(&snapshot()).await;
        let reopened = LocalCache::new(SqliteStore::at(&path), "k");
        assert_eq!(reopened.load().await.unwrap().snapshot, snapshot());
    }
}
