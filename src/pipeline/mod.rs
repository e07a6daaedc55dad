// src/pipeline/mod.rs

//! Incremental run pipeline.
//!
//! - `detect`: classify a snapshot against recorded state
//! - `coordinator`: drive one incremental cycle for a site
//! - `process`: hand the work-set to the downstream processing pipeline
//! - `retention`: bound state-store growth

pub mod coordinator;
pub mod detect;
pub mod process;
pub mod retention;

pub use coordinator::RunCoordinator;
pub use detect::{ChangeDetector, Classification};
pub use process::{FetchProcessor, ProcessOutcome, UrlProcessor};
pub use retention::{PruneReport, RetentionManager, RetentionPolicy};
