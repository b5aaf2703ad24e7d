//! src/services/metadata_cache.rs
//!
//! MetadataCache — durable SQLite mirror of the remote bucket listing.
//! Maps each object identity to its size and the time the row last changed.
//! The schema is created on open when absent and left untouched otherwise.

use crate::models::{cache_record::CacheRecord, identity::ObjectIdentity};
use chrono::{DateTime, FixedOffset};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{collections::HashMap, io, path::Path, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Schema applied on every open. Statements are idempotent.
const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("metadata cache query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("metadata cache location unusable: {0}")]
    Io(#[from] io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Set of changes that brings the cache in line with a remote listing.
///
/// Built by the reconciler and applied in a single transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheChanges {
    /// Identities present remotely but not cached.
    pub inserts: Vec<(ObjectIdentity, i64)>,
    /// Identities cached with a size that differs from the remote one.
    pub updates: Vec<(ObjectIdentity, i64)>,
    /// Identities cached but no longer present remotely.
    pub deletes: Vec<ObjectIdentity>,
}

impl CacheChanges {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct MetadataCache {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl MetadataCache {
    /// Wrap an existing pool. Call [`MetadataCache::initialize`] before use.
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Connect to `database_url`, creating the file (and its parent
    /// directory) when missing, then ensure the schema exists.
    pub async fn open(database_url: &str) -> CacheResult<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        debug!("Interpreted SQLite path => {}", db_path);

        if !db_path.starts_with(":memory:") {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                    tracing::info!("Created missing directory {:?}", parent);
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let cache = Self::new(Arc::new(pool));
        cache.initialize().await?;
        Ok(cache)
    }

    /// Create the `cache_records` table if it does not exist yet.
    pub async fn initialize(&self) -> CacheResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in statements {
            debug!("Executing schema SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    pub async fn get(&self, identity: &ObjectIdentity) -> CacheResult<Option<CacheRecord>> {
        let record = sqlx::query_as::<_, CacheRecord>(
            "SELECT identity, size, last_seen FROM cache_records WHERE identity = ?",
        )
        .bind(identity)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// Whether a row exists for `identity` with exactly `size` bytes.
    pub async fn contains(&self, identity: &ObjectIdentity, size: i64) -> CacheResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM cache_records WHERE identity = ? AND size = ?",
        )
        .bind(identity)
        .bind(size)
        .fetch_optional(&*self.db)
        .await?;
        Ok(found.is_some())
    }

    /// Insert or overwrite the row for `identity`.
    pub async fn upsert(
        &self,
        identity: &ObjectIdentity,
        size: i64,
        last_seen: DateTime<FixedOffset>,
    ) -> CacheResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_records (identity, size, last_seen)
            VALUES (?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                size = excluded.size,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(identity)
        .bind(size)
        .bind(last_seen)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Remove the row for `identity`. Returns whether a row existed.
    pub async fn delete(&self, identity: &ObjectIdentity) -> CacheResult<bool> {
        let result = sqlx::query("DELETE FROM cache_records WHERE identity = ?")
            .bind(identity)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every cached `(identity, size)` pair.
    pub async fn list_all(&self) -> CacheResult<HashMap<ObjectIdentity, i64>> {
        let rows = sqlx::query_as::<_, (ObjectIdentity, i64)>(
            "SELECT identity, size FROM cache_records",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Apply `changes` atomically, stamping touched rows with `last_seen`.
    ///
    /// Either every change lands or none does.
    pub async fn apply(
        &self,
        changes: &CacheChanges,
        last_seen: DateTime<FixedOffset>,
    ) -> CacheResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        for (identity, size) in &changes.inserts {
            sqlx::query("INSERT INTO cache_records (identity, size, last_seen) VALUES (?, ?, ?)")
                .bind(identity)
                .bind(size)
                .bind(last_seen)
                .execute(&mut *tx)
                .await?;
        }

        for (identity, size) in &changes.updates {
            sqlx::query("UPDATE cache_records SET size = ?, last_seen = ? WHERE identity = ?")
                .bind(size)
                .bind(last_seen)
                .bind(identity)
                .execute(&mut *tx)
                .await?;
        }

        for identity in &changes.deletes {
            sqlx::query("DELETE FROM cache_records WHERE identity = ?")
                .bind(identity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
