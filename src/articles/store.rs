//! Article persistence.
//!
//! Every mutation here is a single statement or a single transaction, so a
//! concurrent reader never observes a half-annotated article.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{Article, EntityMention, NewArticle, ProcessingState};
use crate::db::{parse_db_time, to_db_time};

const ARTICLE_COLUMNS: &str = "id, url, title, content, summary, author, source_domain, \
     published_at, fetched_at, is_processed, embedding_handle, entities, sentiment";

/// Filter for [`query_articles`]. Empty filter returns every article, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Inclusive lower bound on the published timestamp. Undated articles never match.
    pub published_since: Option<DateTime<Utc>>,
    pub state: Option<ProcessingState>,
    pub source_domain: Option<String>,
    pub newest_first: bool,
    pub limit: Option<usize>,
    /// Rows skipped before `limit` applies.
    pub offset: Option<usize>,
}

impl ArticleQuery {
    /// Processed articles published at or after `since`, oldest first.
    pub fn processed_since(since: DateTime<Utc>) -> Self {
        Self {
            published_since: Some(since),
            state: Some(ProcessingState::Processed),
            ..Default::default()
        }
    }
}

/// Annotation fields written by [`commit_annotation`].
#[derive(Debug, Clone)]
pub struct AnnotationUpdate {
    pub entities: Vec<EntityMention>,
    pub sentiment: f64,
    pub embedding_handle: Option<String>,
}

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    let published: Option<String> = row.get(7)?;
    let fetched: String = row.get(8)?;
    let entities: Option<String> = row.get(11)?;
    Ok(Article {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        author: row.get(5)?,
        source_domain: row.get(6)?,
        published_at: published.as_deref().and_then(parse_db_time),
        fetched_at: parse_db_time(&fetched).unwrap_or_default(),
        state: ProcessingState::from_flag(row.get::<_, i64>(9)? != 0),
        embedding_handle: row.get(10)?,
        entities: entities.and_then(|json| serde_json::from_str(&json).ok()),
        sentiment: row.get(12)?,
    })
}

pub fn query_articles(conn: &Connection, filter: &ArticleQuery) -> Result<Vec<Article>> {
    let mut clauses = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(since) = filter.published_since {
        clauses.push("published_at IS NOT NULL AND published_at >= ?");
        values.push(Value::Text(to_db_time(&since)));
    }
    if let Some(state) = filter.state {
        clauses.push("is_processed = ?");
        values.push(Value::Integer((state == ProcessingState::Processed) as i64));
    }
    if let Some(ref domain) = filter.source_domain {
        clauses.push("source_domain = ?");
        values.push(Value::Text(domain.clone()));
    }

    let mut sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    // NULL published timestamps sort first ascending in SQLite.
    sql.push_str(if filter.newest_first {
        " ORDER BY published_at DESC, id DESC"
    } else {
        " ORDER BY published_at ASC, id ASC"
    });
    if filter.limit.is_some() || filter.offset.is_some() {
        // SQLite only accepts OFFSET after LIMIT; -1 means unbounded.
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(filter.limit.map_or(-1, |l| l as i64)));
        values.push(Value::Integer(filter.offset.unwrap_or(0) as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), row_to_article)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read articles")?;
    Ok(rows)
}

pub fn get_article(conn: &Connection, id: i64) -> Result<Option<Article>> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_article).optional()?)
}

pub fn url_exists(conn: &Connection, url: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM articles WHERE url = ?1", [url], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Insert a new unprocessed article. Returns `None` when the URL is already stored.
pub fn insert_article(conn: &Connection, record: &NewArticle) -> Result<Option<i64>> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO articles
            (url, title, content, summary, author, source_domain, published_at, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.url,
            record.title,
            record.content,
            record.summary,
            record.author,
            record.source_domain,
            record.published_at.as_ref().map(to_db_time),
            to_db_time(&record.fetched_at),
        ],
    )?;
    Ok((inserted == 1).then(|| conn.last_insert_rowid()))
}

/// Move an article from unprocessed to processed with its annotation fields.
///
/// Returns `false` when the article is gone or another worker got there first;
/// nothing is written in that case.
pub fn commit_annotation(conn: &Connection, id: i64, update: &AnnotationUpdate) -> Result<bool> {
    let entities = serde_json::to_string(&update.entities)?;
    let changed = conn.execute(
        "UPDATE articles
         SET is_processed = 1, entities = ?1, sentiment = ?2, embedding_handle = ?3
         WHERE id = ?4 AND is_processed = 0",
        params![
            entities,
            update.sentiment.clamp(-1.0, 1.0),
            update.embedding_handle,
            id
        ],
    )?;
    Ok(changed == 1)
}

/// Attach a similarity handle to a processed article that has none.
pub fn set_embedding_handle(conn: &Connection, id: i64, handle: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE articles SET embedding_handle = ?1
         WHERE id = ?2 AND is_processed = 1 AND embedding_handle IS NULL",
        params![handle, id],
    )?;
    Ok(changed == 1)
}

pub fn unprocessed_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM articles WHERE is_processed = 0 ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Processed articles the similarity index does not know about.
pub fn unindexed_processed(conn: &Connection) -> Result<Vec<Article>> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles
         WHERE is_processed = 1 AND embedding_handle IS NULL ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_article)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
