// src/models/mod.rs

//! Domain models for the feed engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod run;
mod site;
mod snapshot;

// Re-export all public types
pub use run::{RunCounts, RunOutcome, RunReport};
pub use site::{SiteState, SiteStats, UrlState, UrlStatus};
pub use snapshot::{Snapshot, SnapshotEntry};
