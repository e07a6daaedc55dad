// src/state/mod.rs

//! Durable processing-state storage.
//!
//! The state store is the only shared mutable resource in the engine.
//! Both tables are keyed by site name, so cycles for different sites can
//! run concurrently without a global lock; each operation is a single
//! transaction, so a retried call or a crash mid-call leaves either the
//! old or the new state, never a mix.

pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{SiteState, SiteStats, SnapshotEntry, UrlState, UrlStatus};

// Re-export for convenience
pub use sqlite::SqliteStateStore;

/// Trait for processing-state backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Look up a site's state. No side effects.
    async fn get_site_state(&self, site_name: &str) -> Result<Option<SiteState>>;

    /// Create the site row if absent (idempotent); return the stored state.
    async fn ensure_site_state(&self, site_name: &str, source_url: &str) -> Result<SiteState>;

    /// Bulk status lookup for a snapshot. Queries are batched, never one
    /// round trip per URL. URLs with no row are absent from the map.
    async fn get_url_statuses(
        &self,
        site_name: &str,
        urls: &[String],
    ) -> Result<HashMap<String, UrlState>>;

    /// Record that every entry was observed at `observed_at`: absent URLs
    /// are inserted as UNPROCESSED; existing rows get `last_seen_at`
    /// refreshed with status untouched.
    async fn upsert_url_seen(
        &self,
        site_name: &str,
        entries: &[SnapshotEntry],
        observed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Transition URLs to PROCESSED. Idempotent.
    async fn mark_processed(&self, site_name: &str, urls: &[String]) -> Result<()>;

    /// Transition URLs to FAILED. Idempotent; failed URLs stay eligible
    /// for retry on subsequent runs.
    async fn mark_failed(&self, site_name: &str, urls: &[String]) -> Result<()>;

    /// Update the site's last-run timestamp.
    async fn record_run(&self, site_name: &str, at: DateTime<Utc>) -> Result<()>;

    /// Bulk-delete URL rows whose `last_seen_at` predates the cutoff.
    /// Rows with `keep_status` are exempt. Returns the number deleted.
    async fn delete_stale(
        &self,
        site_name: &str,
        older_than: DateTime<Utc>,
        keep_status: Option<UrlStatus>,
    ) -> Result<u64>;

    /// Total URL rows tracked for a site.
    async fn count_urls(&self, site_name: &str) -> Result<u64>;

    /// Delete up to `limit` rows with the given status, oldest
    /// `last_seen_at` first. Returns the number deleted.
    async fn delete_oldest(&self, site_name: &str, status: UrlStatus, limit: u64) -> Result<u64>;

    /// Per-status row counts for a site.
    async fn site_stats(&self, site_name: &str) -> Result<SiteStats>;

    /// Remove all state for a site, including the site row. Used for an
    /// explicit full restart only; normal runs never delete site rows.
    async fn reset_site(&self, site_name: &str) -> Result<()>;
}
