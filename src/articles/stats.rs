use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Processing statistics for `feedmesh stats` and `/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_articles: u64,
    pub processed_articles: u64,
    pub unprocessed_articles: u64,
    pub indexed_articles: u64,
    pub total_feeds: u64,
    pub active_feeds: u64,
    pub source_domains: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_article: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_article: Option<String>,
}

/// Compute store statistics. `db_path` is only used for the file size; pass
/// `None` for in-memory databases.
pub fn article_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let (total, processed, indexed, domains, oldest, newest): (
        i64,
        i64,
        i64,
        i64,
        Option<String>,
        Option<String>,
    ) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(is_processed), 0),
                COUNT(embedding_handle),
                COUNT(DISTINCT source_domain),
                MIN(published_at),
                MAX(published_at)
         FROM articles",
        [],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        },
    )?;

    let (total_feeds, active_feeds): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM feeds",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_articles: total as u64,
        processed_articles: processed as u64,
        unprocessed_articles: (total - processed) as u64,
        indexed_articles: indexed as u64,
        total_feeds: total_feeds as u64,
        active_feeds: active_feeds as u64,
        source_domains: domains as u64,
        db_size_bytes,
        oldest_article: oldest,
        newest_article: newest,
    })
}
