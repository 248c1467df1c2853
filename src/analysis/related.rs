//! Article lookups driven by the similarity index: neighbours of a stored
//! article and free-text semantic search.

use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::articles::store;
use crate::db;
use crate::similarity::{Neighbor, SimilarityIndex, SimilarityQuery};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedArticle {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Cosine similarity, rounded to three decimals.
    pub score: f64,
}

/// Attach article fields to index hits, keeping their order. Hits whose
/// article was evicted after the lookup are dropped.
fn resolve(conn: &Mutex<Connection>, hits: Vec<Neighbor>) -> Result<Vec<RelatedArticle>> {
    let conn = db::lock(conn)?;
    let mut related = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(article) = store::get_article(&conn, hit.article_id)? else {
            continue;
        };
        related.push(RelatedArticle {
            article_id: article.id,
            title: article.title,
            url: article.url,
            source_domain: article.source_domain,
            published_at: article.published_at,
            score: (hit.score * 1000.0).round() / 1000.0,
        });
    }
    Ok(related)
}

/// Up to `limit` articles closest to `article_id`, best first. `None` when no
/// such article is stored; an article without a vector has no neighbours.
pub fn similar_articles(
    conn: &Mutex<Connection>,
    similarity: &dyn SimilarityIndex,
    article_id: i64,
    limit: usize,
) -> Result<Option<Vec<RelatedArticle>>> {
    let exists = {
        let conn = db::lock(conn)?;
        store::get_article(&conn, article_id)?.is_some()
    };
    if !exists {
        return Ok(None);
    }
    let hits = similarity.nearest(&SimilarityQuery::Article(article_id), limit)?;
    resolve(conn, hits).map(Some)
}

/// Embed `query` and return up to `limit` closest articles, best first.
/// A blank query matches nothing.
pub fn search_articles(
    conn: &Mutex<Connection>,
    similarity: &dyn SimilarityIndex,
    query: &str,
    limit: usize,
) -> Result<Vec<RelatedArticle>> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Ok(vec![]);
    }
    let vector = similarity.embed(query)?;
    let hits = similarity.nearest(&SimilarityQuery::Vector(vector), limit)?;
    tracing::debug!(query = %query, hits = hits.len(), "semantic search");
    resolve(conn, hits)
}
