// src/pipeline/retention.rs

//! State retention: bound the store's growth.
//!
//! Runs independently of the run coordinator, typically once every N
//! cycles. Two passes per site: expire rows unseen for longer than the
//! retention window, then enforce an optional per-site row cap. The cap
//! pass deletes PROCESSED rows first and FAILED rows only last, since
//! failed rows represent unresolved work. The site row itself is never
//! deleted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::UrlStatus;
use crate::state::StateStore;

/// Cap-pass deletion order: unresolved work goes last.
const CAP_ORDER: [UrlStatus; 3] = [
    UrlStatus::Processed,
    UrlStatus::Unprocessed,
    UrlStatus::Failed,
];

/// Retention policy for one prune pass.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Rows unseen for longer than this are deleted
    pub window: Duration,
    /// Optional hard cap on rows per site
    pub max_rows_per_site: Option<u64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::days(30),
            max_rows_per_site: None,
        }
    }
}

/// Result of one prune pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PruneReport {
    /// Rows deleted because they fell out of the retention window
    pub expired: u64,
    /// Rows deleted to enforce the per-site cap
    pub overflow: u64,
}

impl PruneReport {
    pub fn total(&self) -> u64 {
        self.expired + self.overflow
    }
}

/// Prunes URL state for one site at a time.
pub struct RetentionManager {
    store: Arc<dyn StateStore>,
}

impl RetentionManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Apply the retention policy to one site.
    pub async fn prune(&self, site_name: &str, policy: &RetentionPolicy) -> Result<PruneReport> {
        let cutoff = Utc::now() - policy.window;
        let expired = self.store.delete_stale(site_name, cutoff, None).await?;

        let mut overflow = 0;
        if let Some(cap) = policy.max_rows_per_site {
            let mut count = self.store.count_urls(site_name).await?;
            for status in CAP_ORDER {
                if count <= cap {
                    break;
                }
                let deleted = self
                    .store
                    .delete_oldest(site_name, status, count - cap)
                    .await?;
                count -= deleted;
                overflow += deleted;
            }
        }

        let report = PruneReport { expired, overflow };
        if report.total() > 0 {
            log::info!(
                "Site {}: pruned {} expired and {} overflow row(s)",
                site_name,
                expired,
                overflow
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotEntry;
    use crate::state::SqliteStateStore;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, Arc<SqliteStateStore>) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStateStore::connect(tmp.path().join("state.db"))
            .await
            .unwrap();
        store.ensure_site_state("blog", "").await.unwrap();
        (tmp, Arc::new(store))
    }

    fn entries(names: &[&str]) -> Vec<SnapshotEntry> {
        names.iter().map(|s| SnapshotEntry::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_window_prune_removes_all_expired_rows() {
        let (_tmp, store) = test_store().await;

        let old = Utc::now() - Duration::days(45);
        store
            .upsert_url_seen("blog", &entries(&["stale_ok", "stale_failed"]), old)
            .await
            .unwrap();
        store
            .mark_processed("blog", &["stale_ok".to_string()])
            .await
            .unwrap();
        store
            .mark_failed("blog", &["stale_failed".to_string()])
            .await
            .unwrap();
        store
            .upsert_url_seen("blog", &entries(&["fresh"]), Utc::now())
            .await
            .unwrap();

        let manager = RetentionManager::new(store.clone());
        let policy = RetentionPolicy {
            window: Duration::days(30),
            max_rows_per_site: None,
        };
        let report = manager.prune("blog", &policy).await.unwrap();

        // No row older than the cutoff survives, whatever its status
        assert_eq!(report.expired, 2);
        assert_eq!(store.count_urls("blog").await.unwrap(), 1);

        // The site row is untouched
        assert!(store.get_site_state("blog").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cap_deletes_processed_before_failed() {
        let (_tmp, store) = test_store().await;

        let recent = Utc::now() - Duration::days(1);
        store
            .upsert_url_seen("blog", &entries(&["p1", "p2", "f1", "u1"]), recent)
            .await
            .unwrap();
        store
            .mark_processed("blog", &["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();
        store.mark_failed("blog", &["f1".to_string()]).await.unwrap();

        let manager = RetentionManager::new(store.clone());
        let policy = RetentionPolicy {
            window: Duration::days(30),
            max_rows_per_site: Some(2),
        };
        let report = manager.prune("blog", &policy).await.unwrap();

        assert_eq!(report.expired, 0);
        assert_eq!(report.overflow, 2);

        // Both processed rows went first; failed and unprocessed remain
        let stats = store.site_stats("blog").await.unwrap();
        assert_eq!(stats.total_urls, 2);
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unprocessed, 1);
    }

    #[tokio::test]
    async fn test_cap_falls_through_to_failed_rows_last() {
        let (_tmp, store) = test_store().await;

        store
            .upsert_url_seen("blog", &entries(&["f1", "f2", "f3"]), Utc::now())
            .await
            .unwrap();
        store
            .mark_failed(
                "blog",
                &["f1".to_string(), "f2".to_string(), "f3".to_string()],
            )
            .await
            .unwrap();

        let manager = RetentionManager::new(store.clone());
        let policy = RetentionPolicy {
            window: Duration::days(30),
            max_rows_per_site: Some(1),
        };
        let report = manager.prune("blog", &policy).await.unwrap();

        assert_eq!(report.overflow, 2);
        assert_eq!(store.count_urls("blog").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_under_cap_is_a_no_op() {
        let (_tmp, store) = test_store().await;
        store
            .upsert_url_seen("blog", &entries(&["a"]), Utc::now())
            .await
            .unwrap();

        let manager = RetentionManager::new(store.clone());
        let report = manager
            .prune("blog", &RetentionPolicy::default())
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }
}
