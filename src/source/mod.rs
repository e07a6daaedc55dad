// src/source/mod.rs

//! Entry sources: where snapshots come from.
//!
//! The engine only needs the current universe of candidate URLs for a
//! site; it does not care how the set was obtained.

pub mod sitemap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use sitemap::SitemapSource;

/// Trait for snapshot producers.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Produce the current snapshot for one run.
    ///
    /// Failure means the whole cycle aborts with no state mutation, so
    /// implementations must not return partial universes on error.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// The source address, recorded on the site's state row.
    fn locator(&self) -> &str;
}
