//! Manual runs of the ingestion, retention and reindex steps.

use anyhow::Result;

use feedmesh::articles::{feeds, retention};
use feedmesh::config::FeedmeshConfig;
use feedmesh::db;
use feedmesh::server;

/// Run one cycle now, or ingest a single feed regardless of its interval.
pub async fn fetch(config: FeedmeshConfig, feed_url: Option<String>) -> Result<()> {
    let services = server::setup(config)?;
    let scheduler = services.scheduler();

    let Some(url) = feed_url else {
        let report = scheduler.run_cycle().await?;
        println!(
            "Fetched {} feeds ({} failed), saved {} articles, annotated {} ({} indexed, {} failed), evicted {}",
            report.feeds_fetched,
            report.feeds_failed,
            report.articles_saved,
            report.annotation.processed,
            report.annotation.indexed,
            report.annotation.failed,
            report.evicted_before + report.evicted_after,
        );
        return Ok(());
    };

    let feed = db::run_blocking(&services.db, |conn| feeds::list_feeds(conn))
        .await?
        .into_iter()
        .find(|f| f.url == url)
        .ok_or_else(|| anyhow::anyhow!("no feed registered with url {url}"))?;
    let report = services.ingestor.ingest_feed(&feed).await?;
    anyhow::ensure!(!report.fetch_failed, "fetching {url} failed, see log");
    let summary = scheduler.annotate_batch(report.saved.clone()).await;
    println!(
        "{}: {} entries, {} new, {} annotated",
        url,
        report.fetched,
        report.saved.len(),
        summary.processed
    );
    Ok(())
}

/// Evict articles older than `days` (defaults to the configured retention).
pub fn evict(config: &FeedmeshConfig, days: Option<i64>) -> Result<()> {
    let horizon = match days {
        Some(d) => chrono::Duration::try_days(d.max(1))
            .ok_or_else(|| anyhow::anyhow!("retention of {d} days is out of range"))?,
        None => config.retention_horizon(),
    };
    let mut conn = db::open_database(config.resolved_db_path())?;
    let removed = retention::evict_older_than(&mut conn, horizon)?;
    println!("Evicted {removed} articles older than {} days", horizon.num_days());
    Ok(())
}

/// Index processed articles that never got a vector.
pub async fn reindex(config: FeedmeshConfig) -> Result<()> {
    let services = server::setup(config)?;
    let engine = std::sync::Arc::clone(&services.engine);
    let indexed = tokio::task::spawn_blocking(move || engine.reindex_missing()).await??;
    println!("Indexed {indexed} articles");
    Ok(())
}
