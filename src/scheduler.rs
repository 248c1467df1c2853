//! Background ingestion-and-retention loop.
//!
//! Startup runs a retention pass and annotates anything left unprocessed by a
//! previous run. Each cycle then evicts, fetches due feeds concurrently,
//! annotates the new articles on a bounded worker pool, and evicts again.
//! Cancellation is observed between cycles, never in the middle of one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::annotation::{AnnotateOutcome, AnnotationEngine};
use crate::articles::{feeds, retention, store};
use crate::config::SchedulerConfig;
use crate::db::{self, SharedDb};
use crate::ingest::Ingestor;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AnnotateSummary {
    pub processed: usize,
    /// Processed articles that also received a similarity handle.
    pub indexed: usize,
    /// Already processed or gone by the time a worker reached them.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct CycleReport {
    pub evicted_before: usize,
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
    pub articles_saved: usize,
    pub annotation: AnnotateSummary,
    pub evicted_after: usize,
}

pub struct Scheduler {
    db: SharedDb,
    ingestor: Arc<Ingestor>,
    engine: Arc<AnnotationEngine>,
    config: SchedulerConfig,
    horizon: chrono::Duration,
}

impl Scheduler {
    pub fn new(
        db: SharedDb,
        ingestor: Arc<Ingestor>,
        engine: Arc<AnnotationEngine>,
        config: SchedulerConfig,
        horizon: chrono::Duration,
    ) -> Self {
        Self {
            db,
            ingestor,
            engine,
            config,
            horizon,
        }
    }

    pub async fn evict(&self) -> Result<usize> {
        let horizon = self.horizon;
        db::run_blocking(&self.db, move |conn| retention::evict_older_than(conn, horizon)).await
    }

    /// Retention pass followed by catch-up annotation of unprocessed articles.
    pub async fn startup(&self) -> Result<AnnotateSummary> {
        self.evict().await?;
        let pending = db::run_blocking(&self.db, |conn| store::unprocessed_ids(conn)).await?;
        if !pending.is_empty() {
            tracing::info!(pending = pending.len(), "annotating articles left from a previous run");
        }
        Ok(self.annotate_batch(pending).await)
    }

    /// Annotate `ids` on at most `annotation_workers` blocking tasks. A failure
    /// is logged and counted without affecting the other articles.
    pub async fn annotate_batch(&self, ids: Vec<i64>) -> AnnotateSummary {
        let workers = self.config.annotation_workers.max(1);
        let results: Vec<_> = stream::iter(ids)
            .map(|id| {
                let engine = Arc::clone(&self.engine);
                async move { (id, tokio::task::spawn_blocking(move || engine.annotate(id)).await) }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut summary = AnnotateSummary::default();
        for (article_id, result) in results {
            match result {
                Ok(Ok(AnnotateOutcome::Processed { indexed })) => {
                    summary.processed += 1;
                    if indexed {
                        summary.indexed += 1;
                    }
                }
                Ok(Ok(_)) => summary.skipped += 1,
                Ok(Err(e)) => {
                    tracing::warn!(article_id, error = %e, "annotation failed");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!(article_id, error = %e, "annotation task panicked");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// One full pass. Store errors from retention or feed listing are returned;
    /// per-feed and per-article failures are logged and counted.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport {
            evicted_before: self.evict().await?,
            ..Default::default()
        };

        let due = db::run_blocking(&self.db, |conn| feeds::due_feeds(conn, Utc::now())).await?;
        tracing::info!(feeds = due.len(), "fetching due feeds");

        let concurrency = self.config.feed_concurrency.max(1);
        let ingested: Vec<_> = stream::iter(due)
            .map(|feed| {
                let ingestor = Arc::clone(&self.ingestor);
                async move {
                    let result = ingestor.ingest_feed(&feed).await;
                    (feed.url, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut new_ids = Vec::new();
        for (url, result) in ingested {
            match result {
                Ok(r) if r.fetch_failed => report.feeds_failed += 1,
                Ok(r) => {
                    report.feeds_fetched += 1;
                    new_ids.extend(r.saved);
                }
                Err(e) => {
                    tracing::error!(feed = %url, error = %e, "storing feed entries failed");
                    report.feeds_failed += 1;
                }
            }
        }
        report.articles_saved = new_ids.len();

        report.annotation = self.annotate_batch(new_ids).await;
        report.evicted_after = self.evict().await?;

        tracing::info!(
            fetched = report.feeds_fetched,
            failed = report.feeds_failed,
            saved = report.articles_saved,
            processed = report.annotation.processed,
            evicted = report.evicted_before + report.evicted_after,
            "cycle complete"
        );
        Ok(report)
    }

    /// Run startup, then a cycle every `interval_minutes` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let summary = self.startup().await?;
        tracing::info!(processed = summary.processed, failed = summary.failed, "scheduler started");

        let period = Duration::from_secs(self.config.interval_minutes.max(1) * 60);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.run_cycle().await?;
                }
            }
        }
    }
}
