//! Ingestion pipeline: fetch feed entries, drop known URLs, extract full text
//! and store new articles as unprocessed.

mod http;

pub use http::{HtmlExtractor, HttpFeedSource};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::articles::{feeds, store, Feed, NewArticle, RawEntry};
use crate::db::{self, SharedDb};

/// Source of syndication entries (RSS, Atom, JSON Feed...).
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>>;
}

/// Pulls readable body text for an article URL. `Ok(None)` means the page had
/// nothing worth keeping.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<Option<String>>;
}

#[derive(Debug, Default, Serialize)]
pub struct FeedIngestReport {
    pub feed_url: String,
    pub fetched: usize,
    /// Ids of the articles stored by this run, in feed order.
    pub saved: Vec<i64>,
    pub fetch_failed: bool,
}

/// Host part of an article URL, used as the source identity.
pub fn source_domain(link: &str) -> Option<String> {
    url::Url::parse(link)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

pub struct Ingestor {
    db: SharedDb,
    source: Arc<dyn FeedSource>,
    extractor: Option<Arc<dyn ContentExtractor>>,
}

impl Ingestor {
    pub fn new(
        db: SharedDb,
        source: Arc<dyn FeedSource>,
        extractor: Option<Arc<dyn ContentExtractor>>,
    ) -> Self {
        Self {
            db,
            source,
            extractor,
        }
    }

    async fn fetch_logged(&self, url: &str) -> Result<Vec<RawEntry>> {
        self.source.fetch(url).await.inspect_err(|e| {
            tracing::warn!(feed = %url, error = %e, "feed fetch failed");
        })
    }

    /// Fetch a feed. Errors are logged and yield no entries.
    pub async fn fetch(&self, url: &str) -> Vec<RawEntry> {
        self.fetch_logged(url).await.unwrap_or_default()
    }

    /// Store entries whose URL is not yet known. Returns the new article ids.
    pub async fn persist(&self, entries: Vec<RawEntry>) -> Result<Vec<i64>> {
        let mut saved = Vec::new();
        for entry in entries {
            let link = entry.link.trim().to_string();
            if link.is_empty() {
                continue;
            }
            let Some(domain) = source_domain(&link) else {
                tracing::debug!(link = %link, "skipping entry with unparseable link");
                continue;
            };

            let candidate = link.clone();
            if db::run_blocking(&self.db, move |conn| store::url_exists(conn, &candidate)).await? {
                continue;
            }

            let content = match self.extractor {
                Some(ref extractor) => match extractor.extract(&link).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(link = %link, error = %e, "full-text extraction failed, keeping summary");
                        None
                    }
                },
                None => None,
            };

            let title = match entry.title.trim() {
                "" => link.clone(),
                t => t.to_string(),
            };
            let record = NewArticle {
                url: link,
                title,
                content,
                summary: entry.summary,
                author: entry.author,
                source_domain: domain,
                published_at: entry.published,
                fetched_at: Utc::now(),
            };
            let inserted =
                db::run_blocking(&self.db, move |conn| store::insert_article(conn, &record)).await?;
            if let Some(id) = inserted {
                saved.push(id);
            }
        }
        Ok(saved)
    }

    /// Fetch and persist one feed. `last_fetched` only advances when the
    /// fetch itself succeeded.
    pub async fn ingest_feed(&self, feed: &Feed) -> Result<FeedIngestReport> {
        let Ok(entries) = self.fetch_logged(&feed.url).await else {
            return Ok(FeedIngestReport {
                feed_url: feed.url.clone(),
                fetch_failed: true,
                ..Default::default()
            });
        };

        let fetched = entries.len();
        let saved = self.persist(entries).await?;

        let feed_id = feed.id;
        db::run_blocking(&self.db, move |conn| feeds::mark_fetched(conn, feed_id, Utc::now()))
            .await?;

        tracing::info!(feed = %feed.url, fetched, saved = saved.len(), "feed ingested");
        Ok(FeedIngestReport {
            feed_url: feed.url.clone(),
            fetched,
            saved,
            fetch_failed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_lowercased_host() {
        assert_eq!(
            source_domain("https://News.Example.com/a?b=1").as_deref(),
            Some("news.example.com")
        );
        assert_eq!(source_domain("not a url"), None);
    }
}
