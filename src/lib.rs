// src/lib.rs

//! sitefeed - incremental sitemap-to-feed engine.
//!
//! Tracks which URLs of a site have already been processed and
//! published, so each run only touches what changed.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod utils;
