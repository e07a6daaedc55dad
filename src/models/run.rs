// src/models/run.rs

//! Per-run reporting types.

use serde::{Deserialize, Serialize};

/// How an incremental run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Regular incremental cycle
    Normal,
    /// First-ever run for the site; state seeded, no pipeline calls
    Baseline,
    /// Incremental state could not be trusted; everything reprocessed
    FullRefreshDegraded,
    /// The cycle aborted before completion (store or source failure)
    Aborted,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Normal => "NORMAL",
            RunOutcome::Baseline => "BASELINE",
            RunOutcome::FullRefreshDegraded => "FULL_REFRESH_DEGRADED",
            RunOutcome::Aborted => "ABORTED",
        }
    }
}

/// Classification and processing counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Deduplicated snapshot size
    pub total: usize,
    pub new: usize,
    pub retry: usize,
    pub skip: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of one incremental run for a single site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub site_name: String,
    pub outcome: RunOutcome,
    pub counts: RunCounts,
}

impl RunReport {
    pub fn new(site_name: impl Into<String>, outcome: RunOutcome, counts: RunCounts) -> Self {
        Self {
            site_name: site_name.into(),
            outcome,
            counts,
        }
    }

    /// Report for a cycle that aborted before any outcome was recorded.
    pub fn aborted(site_name: impl Into<String>) -> Self {
        Self::new(site_name, RunOutcome::Aborted, RunCounts::default())
    }
}
