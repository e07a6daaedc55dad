// src/models/site.rs

//! Persistent per-site and per-URL processing state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Processing status of a tracked URL.
///
/// Stored as an integer code: 0 unprocessed, 1 processed, 2 failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    /// Observed but not yet handed to the processing pipeline
    Unprocessed,
    /// Successfully processed and published
    Processed,
    /// Last processing attempt failed; eligible for retry
    Failed,
}

impl UrlStatus {
    /// Integer code used in the persistent representation.
    pub fn code(self) -> i64 {
        match self {
            UrlStatus::Unprocessed => 0,
            UrlStatus::Processed => 1,
            UrlStatus::Failed => 2,
        }
    }

    /// Decode a persisted status code.
    ///
    /// An unknown code means the row is corrupted, not merely stale.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(UrlStatus::Unprocessed),
            1 => Ok(UrlStatus::Processed),
            2 => Ok(UrlStatus::Failed),
            other => Err(AppError::storage_corrupted(format!(
                "unknown URL status code {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrlStatus::Unprocessed => "unprocessed",
            UrlStatus::Processed => "processed",
            UrlStatus::Failed => "failed",
        }
    }
}

/// One tracked site. Exactly one row per site name; created on the
/// site's first run and removed only by an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteState {
    pub site_name: String,
    /// Entry-source address, e.g. the sitemap URL
    pub source_url: String,
    /// None until the first successful run completes
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (site, URL) pair ever observed in a snapshot.
///
/// `last_seen_at` is refreshed on every run the URL still appears in the
/// source snapshot, regardless of status. A URL missing from the current
/// snapshot is kept until the retention window expires, so transient
/// sitemap omissions do not discard history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlState {
    pub site_name: String,
    pub url: String,
    pub status: UrlStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Last-modified timestamp committed at insert or on successful
    /// processing; basis for modification-aware retry classification.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Per-status row counts for one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteStats {
    pub total_urls: u64,
    pub unprocessed: u64,
    pub processed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for status in [UrlStatus::Unprocessed, UrlStatus::Processed, UrlStatus::Failed] {
            assert_eq!(UrlStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_code_is_corruption() {
        let err = UrlStatus::from_code(9).unwrap_err();
        assert!(matches!(err, AppError::StorageCorrupted(_)));
    }
}
