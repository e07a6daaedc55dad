// src/pipeline/process.rs

//! Downstream processing pipeline seam.
//!
//! The engine imposes no constraint on what the pipeline does with a
//! URL (fetch, filter, analyze, render, upload) - only that every URL
//! submitted eventually yields exactly one outcome, even if that outcome
//! is a failure.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::Result;

/// Per-URL result reported by the processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    Failure(String),
}

/// Trait for processing-pipeline backends.
#[async_trait]
pub trait UrlProcessor: Send + Sync {
    /// Process the work-set and report one outcome per URL. Outcomes are
    /// independent; processing is never all-or-nothing across the batch.
    async fn process(&self, urls: &[String]) -> Vec<(String, ProcessOutcome)>;
}

/// Default pipeline: fetch each URL and report reachability.
///
/// Downstream content handling (extraction, feed rendering, upload) is
/// deployment-specific; this implementation covers the contract with a
/// plain HTTP round trip per URL.
pub struct FetchProcessor {
    client: reqwest::Client,
    max_concurrent: usize,
}

impl FetchProcessor {
    /// Build a processor with its own HTTP client.
    pub fn new(user_agent: &str, timeout: Duration, max_concurrent: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, max_concurrent))
    }

    /// Build a processor around an existing client.
    pub fn with_client(client: reqwest::Client, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    async fn fetch_one(&self, url: String) -> (String, ProcessOutcome) {
        let outcome = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => ProcessOutcome::Success,
            Ok(response) => ProcessOutcome::Failure(format!("HTTP {}", response.status())),
            Err(e) => ProcessOutcome::Failure(e.to_string()),
        };

        if let ProcessOutcome::Failure(reason) = &outcome {
            log::warn!("Processing failed for {}: {}", url, reason);
        }
        (url, outcome)
    }
}

#[async_trait]
impl UrlProcessor for FetchProcessor {
    async fn process(&self, urls: &[String]) -> Vec<(String, ProcessOutcome)> {
        stream::iter(urls.iter().cloned())
            .map(|url| self.fetch_one(url))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}
