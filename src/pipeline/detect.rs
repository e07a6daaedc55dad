// src/pipeline/detect.rs

//! Change detection between a snapshot and recorded state.
//!
//! Classifies every URL of the current snapshot into exactly one of
//! three disjoint buckets:
//!
//! - **new**: never processed - either no recorded row at all, or a row
//!   still UNPROCESSED (a cancelled or baseline-seeded leftover)
//! - **retry**: recorded as FAILED, or - with modification-aware
//!   detection - recorded as PROCESSED with a strictly newer `lastmod`
//!   than last committed
//! - **skip**: recorded as PROCESSED, nothing to redo
//!
//! Detection performs one bulk status read, classifies in memory, then
//! records the whole snapshot as seen. It never mutates processing
//! status; that is the coordinator's job once downstream outcomes are
//! known, which is what makes back-to-back detection idempotent.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Snapshot, UrlStatus};
use crate::state::StateStore;

/// Result of classifying one snapshot. Immutable; the three buckets are
/// pairwise disjoint and their union is the deduplicated snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub new: Vec<String>,
    pub retry: Vec<String>,
    pub skip: Vec<String>,
    /// Deduplicated snapshot size
    pub total: usize,
}

impl Classification {
    /// Whether any URL needs processing this cycle.
    pub fn has_work(&self) -> bool {
        !self.new.is_empty() || !self.retry.is_empty()
    }

    /// The authoritative work-set for the run: new first, then retries.
    pub fn work_set(&self) -> Vec<String> {
        let mut work = self.new.clone();
        work.extend(self.retry.iter().cloned());
        work
    }
}

/// Detector for computing the delta between snapshot and state.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    /// Whether PROCESSED URLs with a newer `lastmod` are retried
    modification_aware: bool,
}

impl ChangeDetector {
    /// Create a detector using presence-only detection (the default).
    pub fn new() -> Self {
        Self {
            modification_aware: false,
        }
    }

    /// Create a detector that also retries PROCESSED URLs whose current
    /// last-modified timestamp is strictly newer than the committed one.
    pub fn modification_aware() -> Self {
        Self {
            modification_aware: true,
        }
    }

    /// Classify the snapshot against recorded state.
    ///
    /// An empty snapshot yields an empty classification and is not an
    /// error. Duplicate URLs are collapsed before classification, first
    /// occurrence winning.
    pub async fn detect(
        &self,
        store: &dyn StateStore,
        site_name: &str,
        snapshot: &Snapshot,
    ) -> Result<Classification> {
        let entries = snapshot.deduped();
        if entries.is_empty() {
            log::info!("Site {}: empty snapshot, nothing to classify", site_name);
            return Ok(Classification::default());
        }

        let urls: Vec<String> = entries.iter().map(|e| e.url.clone()).collect();
        let known = store.get_url_statuses(site_name, &urls).await?;

        let mut result = Classification {
            total: entries.len(),
            ..Classification::default()
        };

        for entry in &entries {
            match known.get(&entry.url) {
                // A row inserted by a previous detect but never handed a
                // processing outcome is still new work; keeping it in the
                // same bucket makes back-to-back detection classify
                // identically.
                None => result.new.push(entry.url.clone()),
                Some(state) => match state.status {
                    UrlStatus::Unprocessed => result.new.push(entry.url.clone()),
                    UrlStatus::Failed => result.retry.push(entry.url.clone()),
                    UrlStatus::Processed => {
                        if self.modified_since_processed(entry.modified_at, state.modified_at) {
                            result.retry.push(entry.url.clone());
                        } else {
                            result.skip.push(entry.url.clone());
                        }
                    }
                },
            }
        }

        // Refresh last_seen_at for the whole snapshot, SKIPped URLs
        // included, before any status transition of this run.
        store.upsert_url_seen(site_name, &entries, Utc::now()).await?;

        log::info!(
            "Site {}: {} new, {} retry, {} skip of {} URLs",
            site_name,
            result.new.len(),
            result.retry.len(),
            result.skip.len(),
            result.total
        );
        Ok(result)
    }

    /// Modification-aware refinement of RETRY. With nothing committed
    /// for the row there is no evidence of change, so the URL stays
    /// skipped.
    fn modified_since_processed(
        &self,
        current: Option<chrono::DateTime<Utc>>,
        committed: Option<chrono::DateTime<Utc>>,
    ) -> bool {
        if !self.modification_aware {
            return false;
        }
        matches!((current, committed), (Some(cur), Some(rec)) if cur > rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotEntry;
    use crate::state::SqliteStateStore;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, SqliteStateStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStateStore::connect(tmp.path().join("state.db"))
            .await
            .unwrap();
        store.ensure_site_state("blog", "").await.unwrap();
        (tmp, store)
    }

    fn snapshot(urls: &[&str]) -> Snapshot {
        Snapshot::new(urls.iter().map(|u| SnapshotEntry::new(*u)).collect())
    }

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_all_new_on_first_detect() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        let result = detector
            .detect(&store, "blog", &snapshot(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(result.new, vec!["a", "b", "c"]);
        assert!(result.retry.is_empty());
        assert!(result.skip.is_empty());
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn test_classification_partitions_snapshot() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        detector
            .detect(&store, "blog", &snapshot(&["a", "b", "c"]))
            .await
            .unwrap();
        store
            .mark_processed("blog", &["a".to_string()])
            .await
            .unwrap();
        store.mark_failed("blog", &["b".to_string()]).await.unwrap();

        let result = detector
            .detect(&store, "blog", &snapshot(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        let mut union: Vec<&String> = result
            .new
            .iter()
            .chain(result.retry.iter())
            .chain(result.skip.iter())
            .collect();
        assert_eq!(union.len(), result.total);
        let distinct: HashSet<_> = union.drain(..).collect();
        assert_eq!(distinct.len(), 4);
    }

    #[tokio::test]
    async fn test_detect_twice_is_idempotent() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        detector
            .detect(&store, "blog", &snapshot(&["a", "b"]))
            .await
            .unwrap();
        store
            .mark_processed("blog", &["a".to_string()])
            .await
            .unwrap();
        store.mark_failed("blog", &["b".to_string()]).await.unwrap();

        let s = snapshot(&["a", "b", "c"]);
        let first = detector.detect(&store, "blog", &s).await.unwrap();
        let second = detector.detect(&store, "blog", &s).await.unwrap();

        // "c" was inserted as UNPROCESSED by the first detect, yet the
        // second run classifies it identically
        assert_eq!(first.new, vec!["c"]);
        assert_eq!(first.new, second.new);
        assert_eq!(first.retry, second.retry);
        assert_eq!(first.skip, second.skip);
    }

    #[tokio::test]
    async fn test_processed_url_skips_until_it_changes() {
        let (_tmp, store) = test_store().await;

        let detector = ChangeDetector::modification_aware();
        let old = Snapshot::new(vec![SnapshotEntry::with_modified("a", ts(1))]);
        detector.detect(&store, "blog", &old).await.unwrap();
        store
            .mark_processed("blog", &["a".to_string()])
            .await
            .unwrap();

        // Unchanged lastmod classifies as skip
        let unchanged = detector.detect(&store, "blog", &old).await.unwrap();
        assert_eq!(unchanged.skip, vec!["a"]);

        // Strictly newer lastmod reclassifies as retry, idempotently
        let newer = Snapshot::new(vec![SnapshotEntry::with_modified("a", ts(5))]);
        let first = detector.detect(&store, "blog", &newer).await.unwrap();
        let second = detector.detect(&store, "blog", &newer).await.unwrap();
        assert_eq!(first.retry, vec!["a"]);
        assert_eq!(second.retry, vec!["a"]);

        // Reprocessing commits the new timestamp; back to skip
        store
            .mark_processed("blog", &["a".to_string()])
            .await
            .unwrap();
        let settled = detector.detect(&store, "blog", &newer).await.unwrap();
        assert_eq!(settled.skip, vec!["a"]);
    }

    #[tokio::test]
    async fn test_presence_only_ignores_lastmod() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        let old = Snapshot::new(vec![SnapshotEntry::with_modified("a", ts(1))]);
        detector.detect(&store, "blog", &old).await.unwrap();
        store
            .mark_processed("blog", &["a".to_string()])
            .await
            .unwrap();

        let newer = Snapshot::new(vec![SnapshotEntry::with_modified("a", ts(5))]);
        let result = detector.detect(&store, "blog", &newer).await.unwrap();
        assert_eq!(result.skip, vec!["a"]);
    }

    #[tokio::test]
    async fn test_failed_url_retries_indefinitely() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        detector.detect(&store, "blog", &snapshot(&["a"])).await.unwrap();
        store.mark_failed("blog", &["a".to_string()]).await.unwrap();

        for _ in 0..3 {
            let result = detector.detect(&store, "blog", &snapshot(&["a"])).await.unwrap();
            assert_eq!(result.retry, vec!["a"]);
            store.mark_failed("blog", &["a".to_string()]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_duplicates_collapse_before_classification() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        let result = detector
            .detect(&store, "blog", &snapshot(&["a", "a", "b"]))
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.new, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_not_an_error() {
        let (_tmp, store) = test_store().await;
        let detector = ChangeDetector::new();

        let result = detector.detect(&store, "blog", &snapshot(&[])).await.unwrap();
        assert!(!result.has_work());
        assert_eq!(result.total, 0);
    }
}
