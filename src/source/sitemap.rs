// src/source/sitemap.rs

//! Sitemap-backed entry source.
//!
//! Fetches `sitemap.xml`, extracts `<loc>` and `<lastmod>` per URL, and
//! follows sitemap-index entries one level deep. A fetch or parse
//! failure anywhere fails the whole snapshot: a partially fetched
//! universe is indistinguishable from mass deletion downstream.

use std::io::Cursor;

use async_trait::async_trait;
use chrono::Utc;
use sitemap::reader::{SiteMapEntity, SiteMapReader};

use crate::error::{AppError, Result};
use crate::models::{Snapshot, SnapshotEntry};
use crate::source::EntrySource;

/// Entry source reading one sitemap (or sitemap index) URL.
pub struct SitemapSource {
    client: reqwest::Client,
    sitemap_url: String,
}

impl SitemapSource {
    pub fn new(client: reqwest::Client, sitemap_url: impl Into<String>) -> Self {
        Self {
            client,
            sitemap_url: sitemap_url.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::snapshot(format!("fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::snapshot(format!(
                "fetch {url}: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::snapshot(format!("read {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl EntrySource for SitemapSource {
    async fn snapshot(&self) -> Result<Snapshot> {
        let root = self.fetch(&self.sitemap_url).await?;
        let (mut entries, nested) = parse_sitemap(&root);

        // Sitemap indexes reference child sitemaps; follow one level
        for child_url in nested {
            log::debug!("Following nested sitemap {}", child_url);
            let child = self.fetch(&child_url).await?;
            let (child_entries, _) = parse_sitemap(&child);
            entries.extend(child_entries);
        }

        log::info!(
            "Sitemap {}: {} candidate URL(s)",
            self.sitemap_url,
            entries.len()
        );
        Ok(Snapshot::new(entries))
    }

    fn locator(&self) -> &str {
        &self.sitemap_url
    }
}

/// Parse sitemap XML into URL entries and nested sitemap references.
fn parse_sitemap(xml: &[u8]) -> (Vec<SnapshotEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut nested = Vec::new();

    let parser = SiteMapReader::new(Cursor::new(xml));
    for entity in parser {
        match entity {
            SiteMapEntity::Url(url_entry) => {
                if let Some(url) = url_entry.loc.get_url() {
                    let modified_at = url_entry
                        .lastmod
                        .get_time()
                        .map(|t| t.with_timezone(&Utc));
                    entries.push(SnapshotEntry {
                        url: url.to_string(),
                        modified_at,
                    });
                }
            }
            SiteMapEntity::SiteMap(sitemap_entry) => {
                if let Some(url) = sitemap_entry.loc.get_url() {
                    nested.push(url.to_string());
                }
            }
            _ => {}
        }
    }

    (entries, nested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/posts/hello</loc>
    <lastmod>2026-08-01T12:00:00+00:00</lastmod>
  </url>
  <url>
    <loc>https://example.com/posts/undated</loc>
  </url>
</urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap>
    <loc>https://example.com/sitemap-posts.xml</loc>
  </sitemap>
  <sitemap>
    <loc>https://example.com/sitemap-pages.xml</loc>
  </sitemap>
</sitemapindex>"#;

    #[test]
    fn test_parse_urlset_with_lastmod() {
        let (entries, nested) = parse_sitemap(URLSET.as_bytes());

        assert!(nested.is_empty());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://example.com/posts/hello");
        assert_eq!(
            entries[0].modified_at,
            Some(Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(entries[1].modified_at, None);
    }

    #[test]
    fn test_parse_sitemap_index() {
        let (entries, nested) = parse_sitemap(INDEX.as_bytes());

        assert!(entries.is_empty());
        assert_eq!(
            nested,
            vec![
                "https://example.com/sitemap-posts.xml",
                "https://example.com/sitemap-pages.xml"
            ]
        );
    }

    #[test]
    fn test_parse_garbage_yields_empty() {
        let (entries, nested) = parse_sitemap(b"not xml at all");
        assert!(entries.is_empty());
        assert!(nested.is_empty());
    }
}
