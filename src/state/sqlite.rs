// src/state/sqlite.rs

//! SQLite-backed state store.
//!
//! One database file per deployment, two tables:
//!
//! ```text
//! site_states (site_name PK, source_url, last_run_at, created_at, updated_at)
//! url_states  (site_name, url, status, first_seen_at, last_seen_at,
//!              modified_at, seen_modified_at, PK(site_name, url))
//! ```
//!
//! Every mutating primitive runs in a single transaction. WAL journaling
//! plus the composite primary key keeps concurrent cycles for different
//! sites from blocking each other.
//!
//! `modified_at` is the committed last-modified timestamp (set at insert
//! and advanced on successful processing); `seen_modified_at` is the
//! latest value observed in any snapshot. Keeping them separate makes
//! detection idempotent: observing a newer `lastmod` twice in a row
//! classifies the same both times, until a reconcile commits it.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::{SiteState, SiteStats, SnapshotEntry, UrlState, UrlStatus};
use crate::state::StateStore;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS site_states (
        site_name TEXT PRIMARY KEY,
        source_url TEXT NOT NULL,
        last_run_at TEXT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS url_states (
        site_name TEXT NOT NULL,
        url TEXT NOT NULL,
        status INTEGER NOT NULL DEFAULT 0,
        first_seen_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL,
        modified_at TEXT NULL,
        seen_modified_at TEXT NULL,
        PRIMARY KEY (site_name, url),
        FOREIGN KEY (site_name) REFERENCES site_states(site_name)
    )",
    "CREATE INDEX IF NOT EXISTS idx_url_states_status
        ON url_states(site_name, status)",
    "CREATE INDEX IF NOT EXISTS idx_url_states_last_seen
        ON url_states(site_name, last_seen_at)",
];

/// Maximum URLs bound into one `IN (...)` clause. SQLite's default
/// parameter limit is 999.
const BIND_CHUNK: usize = 500;

/// SQLite state store backend.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::debug!("State store schema ready");
        Ok(())
    }

    /// Shared implementation for mark_processed / mark_failed.
    ///
    /// A successful processing run also commits the latest observed
    /// last-modified timestamp, settling any pending modification.
    async fn mark_status(&self, site_name: &str, urls: &[String], status: UrlStatus) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let sql = if status == UrlStatus::Processed {
            "UPDATE url_states
             SET status = ?, modified_at = COALESCE(seen_modified_at, modified_at)
             WHERE site_name = ? AND url = ?"
        } else {
            "UPDATE url_states SET status = ? WHERE site_name = ? AND url = ?"
        };

        let mut tx = self.pool.begin().await?;
        for url in urls {
            sqlx::query(sql)
                .bind(status.code())
                .bind(site_name)
                .bind(url)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        log::debug!(
            "Marked {} URL(s) as {} for site {}",
            urls.len(),
            status.as_str(),
            site_name
        );
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get_site_state(&self, site_name: &str) -> Result<Option<SiteState>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT site_name, source_url, last_run_at, created_at, updated_at
             FROM site_states WHERE site_name = ?",
        )
        .bind(site_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn ensure_site_state(&self, site_name: &str, source_url: &str) -> Result<SiteState> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO site_states (site_name, source_url, last_run_at, created_at, updated_at)
             VALUES (?, ?, NULL, ?, ?)
             ON CONFLICT(site_name) DO NOTHING",
        )
        .bind(site_name)
        .bind(source_url)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT site_name, source_url, last_run_at, created_at, updated_at
             FROM site_states WHERE site_name = ?",
        )
        .bind(site_name)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::storage_corrupted(format!("site row missing for {site_name}")))?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_url_statuses(
        &self,
        site_name: &str,
        urls: &[String],
    ) -> Result<HashMap<String, UrlState>> {
        // Bind the requested URLs directly, chunked to stay under the
        // parameter limit. Row count per call is bounded by the request,
        // not by the site's history.
        let mut map = HashMap::new();
        for chunk in urls.chunks(BIND_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT site_name, url, status, first_seen_at, last_seen_at, modified_at
                 FROM url_states WHERE site_name = ? AND url IN ({placeholders})"
            );

            let mut query = sqlx::query_as::<_, UrlRow>(&sql).bind(site_name);
            for url in chunk {
                query = query.bind(url);
            }

            for row in query.fetch_all(&self.pool).await? {
                let state = UrlState::try_from(row)?;
                map.insert(state.url.clone(), state);
            }
        }
        Ok(map)
    }

    async fn upsert_url_seen(
        &self,
        site_name: &str,
        entries: &[SnapshotEntry],
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO url_states
                     (site_name, url, status, first_seen_at, last_seen_at,
                      modified_at, seen_modified_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(site_name, url) DO UPDATE SET
                     last_seen_at = excluded.last_seen_at,
                     seen_modified_at =
                         COALESCE(excluded.seen_modified_at, url_states.seen_modified_at)",
            )
            .bind(site_name)
            .bind(&entry.url)
            .bind(UrlStatus::Unprocessed.code())
            .bind(observed_at)
            .bind(observed_at)
            .bind(entry.modified_at)
            .bind(entry.modified_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        log::debug!(
            "Recorded {} URL(s) as seen for site {}",
            entries.len(),
            site_name
        );
        Ok(())
    }

    async fn mark_processed(&self, site_name: &str, urls: &[String]) -> Result<()> {
        self.mark_status(site_name, urls, UrlStatus::Processed).await
    }

    async fn mark_failed(&self, site_name: &str, urls: &[String]) -> Result<()> {
        self.mark_status(site_name, urls, UrlStatus::Failed).await
    }

    async fn record_run(&self, site_name: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE site_states SET last_run_at = ?, updated_at = ? WHERE site_name = ?",
        )
        .bind(at)
        .bind(Utc::now())
        .bind(site_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_stale(
        &self,
        site_name: &str,
        older_than: DateTime<Utc>,
        keep_status: Option<UrlStatus>,
    ) -> Result<u64> {
        let result = match keep_status {
            Some(status) => {
                sqlx::query(
                    "DELETE FROM url_states
                     WHERE site_name = ? AND last_seen_at < ? AND status != ?",
                )
                .bind(site_name)
                .bind(older_than)
                .bind(status.code())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM url_states WHERE site_name = ? AND last_seen_at < ?")
                    .bind(site_name)
                    .bind(older_than)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn count_urls(&self, site_name: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM url_states WHERE site_name = ?")
                .bind(site_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn delete_oldest(&self, site_name: &str, status: UrlStatus, limit: u64) -> Result<u64> {
        if limit == 0 {
            return Ok(0);
        }

        let result = sqlx::query(
            "DELETE FROM url_states WHERE rowid IN (
                 SELECT rowid FROM url_states
                 WHERE site_name = ? AND status = ?
                 ORDER BY last_seen_at ASC
                 LIMIT ?
             )",
        )
        .bind(site_name)
        .bind(status.code())
        .bind(limit as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn site_stats(&self, site_name: &str) -> Result<SiteStats> {
        let (total, unprocessed, processed, failed): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                 COUNT(*),
                 COALESCE(SUM(CASE WHEN status = 0 THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN status = 1 THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN status = 2 THEN 1 ELSE 0 END), 0)
             FROM url_states WHERE site_name = ?",
        )
        .bind(site_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(SiteStats {
            total_urls: total as u64,
            unprocessed: unprocessed as u64,
            processed: processed as u64,
            failed: failed as u64,
        })
    }

    async fn reset_site(&self, site_name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM url_states WHERE site_name = ?")
            .bind(site_name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM site_states WHERE site_name = ?")
            .bind(site_name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("Reset all state for site {}", site_name);
        Ok(())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SiteRow {
    site_name: String,
    source_url: String,
    last_run_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SiteRow> for SiteState {
    fn from(row: SiteRow) -> Self {
        SiteState {
            site_name: row.site_name,
            source_url: row.source_url,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UrlRow {
    site_name: String,
    url: String,
    status: i64,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
}

impl TryFrom<UrlRow> for UrlState {
    type Error = AppError;

    fn try_from(row: UrlRow) -> Result<Self> {
        Ok(UrlState {
            site_name: row.site_name,
            url: row.url,
            status: UrlStatus::from_code(row.status)?,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            modified_at: row.modified_at,
        })
    }
}
