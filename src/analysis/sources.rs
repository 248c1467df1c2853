use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub source_domain: String,
    pub article_count: u64,
    /// Mean over scored articles, rounded to three decimals; 0.0 when none are scored.
    pub avg_sentiment: f64,
}

/// All-time per-domain counts and mean sentiment, busiest domain first.
pub fn source_statistics(conn: &Connection) -> Result<Vec<SourceStats>> {
    let mut stmt = conn.prepare(
        "SELECT source_domain, COUNT(*), AVG(sentiment)
         FROM articles
         GROUP BY source_domain
         ORDER BY COUNT(*) DESC, source_domain ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let avg: Option<f64> = row.get(2)?;
            Ok(SourceStats {
                source_domain: row.get(0)?,
                article_count: row.get::<_, i64>(1)? as u64,
                avg_sentiment: avg.map_or(0.0, |v| (v * 1000.0).round() / 1000.0),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
