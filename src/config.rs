// src/config.rs

//! Application configuration structures.
//!
//! Configuration is a single TOML file: store location, run behavior,
//! retention policy, fetch settings, and the list of tracked sites.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::RetentionPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// State store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Incremental run behavior
    #[serde(default)]
    pub run: RunConfig,

    /// State retention policy
    #[serde(default)]
    pub retention: RetentionConfig,

    /// HTTP fetch settings for the default processing pipeline
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Tracked sites
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.retention.window_days == 0 {
            return Err(AppError::validation("retention.window_days must be > 0"));
        }
        for site in &self.sites {
            if site.name.trim().is_empty() {
                return Err(AppError::validation("site with empty name"));
            }
            url::Url::parse(&site.sitemap_url).map_err(|e| {
                AppError::validation(format!("site {}: bad sitemap_url: {e}", site.name))
            })?;
        }
        Ok(())
    }

    /// Find a tracked site by name.
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// State store location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "defaults::db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
        }
    }
}

/// Incremental run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// How many of the most recent entries a first run seeds as already
    /// published, so day one does not reprocess the whole backlog
    #[serde(default = "defaults::baseline_size")]
    pub baseline_size: usize,

    /// Retry PROCESSED URLs whose sitemap lastmod moved forward
    #[serde(default)]
    pub modification_aware: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            baseline_size: defaults::baseline_size(),
            modification_aware: false,
        }
    }
}

/// State retention policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// URL rows unseen for this many days are pruned
    #[serde(default = "defaults::window_days")]
    pub window_days: u64,

    /// Optional hard cap on URL rows per site
    #[serde(default)]
    pub max_rows_per_site: Option<u64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_days: defaults::window_days(),
            max_rows_per_site: None,
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            window: chrono::Duration::days(self.window_days as i64),
            max_rows_per_site: self.max_rows_per_site,
        }
    }
}

/// HTTP settings for sitemap fetches and the default pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One tracked site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Unique site identifier
    pub name: String,
    /// Sitemap address used as the entry source
    pub sitemap_url: String,
}

mod defaults {
    use std::path::PathBuf;

    pub fn db_path() -> PathBuf {
        PathBuf::from("sitefeed.db")
    }

    pub fn baseline_size() -> usize {
        20
    }

    pub fn window_days() -> u64 {
        30
    }

    pub fn user_agent() -> String {
        format!("sitefeed/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn timeout() -> u64 {
        30
    }

    pub fn max_concurrent() -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.baseline_size, 20);
        assert!(!config.run.modification_aware);
        assert_eq!(config.retention.window_days, 30);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            db_path = "state/feeds.db"

            [[sites]]
            name = "blog"
            sitemap_url = "https://example.com/sitemap.xml"
            "#,
        )
        .unwrap();

        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.site("blog").unwrap().sitemap_url, "https://example.com/sitemap.xml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_sitemap_url_fails_validation() {
        let config: Config = toml::from_str(
            r#"
            [[sites]]
            name = "blog"
            sitemap_url = "not a url"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
