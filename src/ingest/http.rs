use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{ContentExtractor, FeedSource};
use crate::articles::RawEntry;
use crate::config::IngestConfig;

const TEXT_WIDTH: usize = 120;
/// Pages shorter than this after conversion are treated as having no body.
const MIN_BODY_CHARS: usize = 200;

fn build_client(config: &IngestConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("failed to build HTTP client")
}

fn html_to_text(html: &[u8]) -> Option<String> {
    let text = html2text::from_read(html, TEXT_WIDTH).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// RSS/Atom/JSON feed fetcher.
pub struct HttpFeedSource {
    client: reqwest::Client,
    max_entries: usize,
}

impl HttpFeedSource {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            max_entries: config.max_entries_per_feed,
        })
    }
}

/// Map parsed feed entries to raw entries, keeping at most `max` of them.
pub(crate) fn entries_from_feed(feed: feed_rs::model::Feed, max: usize) -> Vec<RawEntry> {
    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .and_then(|html| html_to_text(html.as_bytes()));
            Some(RawEntry {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link,
                summary,
                author: entry.authors.first().map(|p| p.name.clone()),
                published: entry.published.or(entry.updated),
            })
        })
        .take(max)
        .collect()
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("feed request failed")?
            .error_for_status()
            .context("feed returned error status")?;
        let bytes = resp.bytes().await.context("failed to read feed body")?;
        let feed = feed_rs::parser::parse(&bytes[..]).context("failed to parse feed")?;

        let entries = entries_from_feed(feed, self.max_entries);
        tracing::debug!(feed = %url, entries = entries.len(), "feed parsed");
        Ok(entries)
    }
}

/// Downloads an article page and converts it to plain text.
pub struct HtmlExtractor {
    client: reqwest::Client,
}

impl HtmlExtractor {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    async fn extract(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("article request failed")?
            .error_for_status()
            .context("article returned error status")?;
        let body = resp.bytes().await.context("failed to read article body")?;
        Ok(html_to_text(&body[..]).filter(|t| t.chars().count() >= MIN_BODY_CHARS))
    }
}
