// src/pipeline/coordinator.rs

//! One incremental cycle per site.
//!
//! The coordinator owns the run state machine: take a snapshot, detect
//! changes, hand the work-set downstream, record outcomes, stamp the
//! run. It guarantees the store is left consistent under partial
//! failure: seen-timestamps for the whole snapshot are persisted before
//! any status transition, and reconciliation only ever moves state
//! forward for URLs with a definite outcome, so a cancelled run needs
//! no rollback.
//!
//! Degradation: if detection finds the recorded state corrupted, the
//! run falls back to processing the entire snapshot and resynchronizing
//! state afterward. That path and the first-run baseline share the same
//! bulk seed-and-mark plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::RunConfig;
use crate::error::{AppError, Result};
use crate::models::{RunCounts, RunOutcome, RunReport, Snapshot, SnapshotEntry};
use crate::pipeline::detect::ChangeDetector;
use crate::pipeline::process::{ProcessOutcome, UrlProcessor};
use crate::source::EntrySource;
use crate::state::StateStore;

/// Orchestrates incremental runs against one state store.
pub struct RunCoordinator {
    store: Arc<dyn StateStore>,
    processor: Arc<dyn UrlProcessor>,
    detector: ChangeDetector,
    baseline_size: usize,
}

impl RunCoordinator {
    pub fn new(
        store: Arc<dyn StateStore>,
        processor: Arc<dyn UrlProcessor>,
        config: &RunConfig,
    ) -> Self {
        let detector = if config.modification_aware {
            ChangeDetector::modification_aware()
        } else {
            ChangeDetector::new()
        };
        Self {
            store,
            processor,
            detector,
            baseline_size: config.baseline_size,
        }
    }

    /// Execute one incremental cycle for a site.
    ///
    /// A snapshot failure aborts before any state is touched. Store
    /// unavailability aborts the cycle cleanly; retry is the caller's
    /// scheduling concern, not handled here.
    pub async fn run(&self, site_name: &str, source: &dyn EntrySource) -> Result<RunReport> {
        let snapshot = source.snapshot().await?;
        log::info!(
            "Site {}: snapshot of {} entries from {}",
            site_name,
            snapshot.len(),
            source.locator()
        );

        let existing = self.store.get_site_state(site_name).await?;
        self.store
            .ensure_site_state(site_name, source.locator())
            .await?;

        if existing.is_none() {
            return self.baseline(site_name, &snapshot).await;
        }

        let classification = match self
            .detector
            .detect(self.store.as_ref(), site_name, &snapshot)
            .await
        {
            Ok(classification) => classification,
            Err(AppError::StorageCorrupted(reason)) => {
                log::warn!(
                    "Site {}: recorded state corrupted ({}); degrading to full refresh",
                    site_name,
                    reason
                );
                return self.full_refresh(site_name, &snapshot).await;
            }
            Err(e) => return Err(e),
        };

        let mut counts = RunCounts {
            total: classification.total,
            new: classification.new.len(),
            retry: classification.retry.len(),
            skip: classification.skip.len(),
            ..RunCounts::default()
        };

        if classification.has_work() {
            let (succeeded, failed) = self
                .process_and_mark(site_name, classification.work_set())
                .await?;
            counts.succeeded = succeeded;
            counts.failed = failed;
        }

        self.store.record_run(site_name, Utc::now()).await?;
        Ok(RunReport::new(site_name, RunOutcome::Normal, counts))
    }

    /// First-ever run for a site: seed the N most recent entries as
    /// already published and the remainder as unprocessed, with zero
    /// pipeline calls. `counts.succeeded` reports the seeded entries.
    async fn baseline(&self, site_name: &str, snapshot: &Snapshot) -> Result<RunReport> {
        let entries = snapshot.deduped();
        log::info!(
            "Site {}: first run, seeding baseline of up to {} entries from {}",
            site_name,
            self.baseline_size,
            entries.len()
        );

        self.seed_snapshot(site_name, &entries).await?;

        let seeded: Vec<String> = snapshot
            .most_recent(self.baseline_size)
            .into_iter()
            .map(|e| e.url)
            .collect();
        self.store.mark_processed(site_name, &seeded).await?;
        self.store.record_run(site_name, Utc::now()).await?;

        let counts = RunCounts {
            total: entries.len(),
            new: entries.len(),
            succeeded: seeded.len(),
            ..RunCounts::default()
        };
        Ok(RunReport::new(site_name, RunOutcome::Baseline, counts))
    }

    /// Degraded run: bypass classification, treat the whole snapshot as
    /// the work-set, and resynchronize state from the outcomes. Logged
    /// as a distinct outcome so repeated degradation is visible.
    async fn full_refresh(&self, site_name: &str, snapshot: &Snapshot) -> Result<RunReport> {
        let entries = snapshot.deduped();
        self.seed_snapshot(site_name, &entries).await?;

        let work: Vec<String> = entries.iter().map(|e| e.url.clone()).collect();
        let (succeeded, failed) = self.process_and_mark(site_name, work).await?;
        self.store.record_run(site_name, Utc::now()).await?;

        let counts = RunCounts {
            total: entries.len(),
            succeeded,
            failed,
            ..RunCounts::default()
        };
        Ok(RunReport::new(
            site_name,
            RunOutcome::FullRefreshDegraded,
            counts,
        ))
    }

    /// Persist seen-state for a deduplicated snapshot. Shared by the
    /// baseline and full-refresh paths.
    async fn seed_snapshot(&self, site_name: &str, entries: &[SnapshotEntry]) -> Result<()> {
        self.store
            .upsert_url_seen(site_name, entries, Utc::now())
            .await
    }

    /// Hand the work-set downstream and reconcile the reported outcomes.
    /// A URL the pipeline never reported on is recorded as failed, so
    /// every submitted URL ends up with exactly one outcome.
    async fn process_and_mark(
        &self,
        site_name: &str,
        work: Vec<String>,
    ) -> Result<(usize, usize)> {
        if work.is_empty() {
            return Ok((0, 0));
        }

        log::info!("Site {}: processing {} URL(s)", site_name, work.len());
        let mut reported: HashMap<String, ProcessOutcome> =
            self.processor.process(&work).await.into_iter().collect();

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for url in &work {
            match reported.remove(url) {
                Some(ProcessOutcome::Success) => succeeded.push(url.clone()),
                Some(ProcessOutcome::Failure(_)) => failed.push(url.clone()),
                None => {
                    log::warn!("Site {}: no outcome reported for {}", site_name, url);
                    failed.push(url.clone());
                }
            }
        }

        self.store.mark_processed(site_name, &succeeded).await?;
        self.store.mark_failed(site_name, &failed).await?;

        log::info!(
            "Site {}: {} succeeded, {} failed",
            site_name,
            succeeded.len(),
            failed.len()
        );
        Ok((succeeded.len(), failed.len()))
    }
}
