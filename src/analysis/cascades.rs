//! Cross-source cascade detection.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{load_window, mentions, window_start};
use crate::articles::Article;

#[derive(Debug, Clone, Serialize)]
pub struct CascadeArticle {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub published_at: DateTime<Utc>,
}

/// An entity reported by at least two distinct source domains in the window.
#[derive(Debug, Clone, Serialize)]
pub struct Cascade {
    /// Surface text of the first mention seen.
    pub entity: String,
    pub entity_type: String,
    pub key: String,
    /// Number of distinct contributing articles.
    pub mention_count: usize,
    pub source_count: usize,
    pub sources: Vec<String>,
    /// Contributing articles per hour between first and last mention, with a
    /// one hour floor on the elapsed time.
    pub velocity: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub articles: Vec<CascadeArticle>,
}

struct Group {
    entity: String,
    entity_type: String,
    key: String,
    seen: HashSet<i64>,
    sources: BTreeSet<String>,
    articles: Vec<CascadeArticle>,
}

/// Cascades among processed articles published in the last `hours`.
pub fn detect_cascades(conn: &Connection, hours: i64) -> Result<Vec<Cascade>> {
    let Some(since) = window_start(hours) else {
        return Ok(vec![]);
    };
    let articles = load_window(conn, since)?;
    let cascades = cascades_from(&articles);
    tracing::debug!(hours, articles = articles.len(), cascades = cascades.len(), "cascade detection");
    Ok(cascades)
}

/// Group mentions by (lowercase text, type) and keep groups spanning two or
/// more sources. `articles` must be in ascending publish order.
pub fn cascades_from(articles: &[Article]) -> Vec<Cascade> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for m in mentions(articles) {
        let Some(published_at) = m.article.published_at else {
            continue;
        };
        let slot = *index
            .entry((m.key.clone(), m.entity_type.to_string()))
            .or_insert_with(|| {
                groups.push(Group {
                    entity: m.text.to_string(),
                    entity_type: m.entity_type.to_string(),
                    key: m.key.clone(),
                    seen: HashSet::new(),
                    sources: BTreeSet::new(),
                    articles: Vec::new(),
                });
                groups.len() - 1
            });
        let group = &mut groups[slot];
        if group.seen.insert(m.article.id) {
            group.sources.insert(m.article.source_domain.clone());
            group.articles.push(CascadeArticle {
                article_id: m.article.id,
                title: m.article.title.clone(),
                url: m.article.url.clone(),
                source_domain: m.article.source_domain.clone(),
                published_at,
            });
        }
    }

    let mut cascades: Vec<Cascade> = groups
        .into_iter()
        .filter(|g| g.sources.len() >= 2)
        .filter_map(|g| {
            let first_seen = g.articles.first()?.published_at;
            let last_seen = g.articles.last()?.published_at;
            let elapsed_hours = (last_seen - first_seen).num_milliseconds() as f64 / 3_600_000.0;
            let mention_count = g.articles.len();
            Some(Cascade {
                entity: g.entity,
                entity_type: g.entity_type,
                key: g.key,
                mention_count,
                source_count: g.sources.len(),
                sources: g.sources.into_iter().collect(),
                velocity: mention_count as f64 / elapsed_hours.max(1.0),
                first_seen,
                last_seen,
                articles: g.articles,
            })
        })
        .collect();

    // Stable: equal keys keep first-seen order.
    cascades.sort_by(|a, b| {
        (b.source_count, b.mention_count).cmp(&(a.source_count, a.mention_count))
    });
    cascades
}
