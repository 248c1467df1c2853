use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{load_window, window_start_days};
use crate::articles::Article;

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub published_at: DateTime<Utc>,
}

/// Articles from the last `days` that mention `entity` (case-insensitive exact
/// surface match), one entry per article, oldest first.
pub fn entity_timeline(conn: &Connection, entity: &str, days: i64) -> Result<Vec<TimelineEntry>> {
    let needle = entity.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(vec![]);
    }
    let Some(since) = window_start_days(days) else {
        return Ok(vec![]);
    };
    let articles = load_window(conn, since)?;
    Ok(timeline_from(&articles, &needle))
}

pub fn timeline_from(articles: &[Article], needle: &str) -> Vec<TimelineEntry> {
    articles
        .iter()
        .filter(|a| {
            a.entities
                .iter()
                .flatten()
                .any(|m| m.text.to_lowercase() == needle)
        })
        .filter_map(|a| {
            Some(TimelineEntry {
                article_id: a.id,
                title: a.title.clone(),
                url: a.url.clone(),
                source_domain: a.source_domain.clone(),
                published_at: a.published_at?,
            })
        })
        .collect()
}
