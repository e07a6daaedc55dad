// src/models/snapshot.rs

//! Entry-source snapshots.
//!
//! A snapshot is the current universe of candidate URLs for one site,
//! produced by the entry source at the start of a run. The engine does
//! not care how the set was obtained (sitemap parse, API listing, ...).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single candidate item: URL plus optional last-modified timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub url: String,
    /// `<lastmod>` from the sitemap, when present
    pub modified_at: Option<DateTime<Utc>>,
}

impl SnapshotEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            modified_at: None,
        }
    }

    pub fn with_modified(url: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            modified_at: Some(modified_at),
        }
    }
}

/// The full candidate set for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deduplicate by URL, preserving order. The first occurrence wins
    /// for any per-URL metadata.
    pub fn deduped(&self) -> Vec<SnapshotEntry> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.url.as_str()))
            .cloned()
            .collect()
    }

    /// The `n` most recent entries by last-modified timestamp, newest
    /// first. Entries without a timestamp sort last, keeping their
    /// snapshot order. Used for baseline initialization.
    pub fn most_recent(&self, n: usize) -> Vec<SnapshotEntry> {
        let mut entries = self.deduped();
        entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        entries.truncate(n);
        entries
    }
}
