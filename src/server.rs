//! Service wiring and the read-only HTTP query surface.
//!
//! [`setup`] opens the database and builds every capability once; [`serve`]
//! runs the scheduler next to an axum router until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::analysis::{
    self, Cascade, KnowledgeGraph, RelatedArticle, SourceStats, TimelineEntry, TrendingTopic,
};
use crate::annotation::{self, AnnotationEngine};
use crate::articles::{feeds, stats::StatsResponse, store, Article, ArticleQuery};
use crate::config::FeedmeshConfig;
use crate::db::{self, HealthReport, SharedDb};
use crate::embedding;
use crate::ingest::{ContentExtractor, HtmlExtractor, HttpFeedSource, Ingestor};
use crate::scheduler::Scheduler;
use crate::similarity::{SimilarityIndex, UnavailableIndex, VecIndex};

/// Cascades returned per query response.
const TOP_CASCADES: usize = 10;
const MAX_PAGE: usize = 100;

/// Everything built once at startup and shared by reference count.
pub struct Services {
    pub db: SharedDb,
    pub similarity: Arc<dyn SimilarityIndex>,
    pub engine: Arc<AnnotationEngine>,
    pub ingestor: Arc<Ingestor>,
    pub config: Arc<FeedmeshConfig>,
}

/// Open the database, seed feeds and construct the capabilities.
pub fn setup(config: FeedmeshConfig) -> Result<Services> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;

    if let Ok(Some(stored)) = db::migrations::get_embedding_model(&conn) {
        if stored != config.embedding.model {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "embedding model changed; similarity scores mix models until vectors are rebuilt"
            );
        }
    }
    feeds::seed_feeds(&conn, &config.feeds)?;
    let db = db::shared(conn);

    let similarity: Arc<dyn SimilarityIndex> = match embedding::create_provider(&config.embedding) {
        Ok(provider) => Arc::new(VecIndex::new(Arc::clone(&db), Arc::from(provider))),
        Err(e) => {
            tracing::warn!(error = %e, "embedding model unavailable, articles will be stored without vectors");
            Arc::new(UnavailableIndex::new(e.to_string()))
        }
    };

    let annotator = Arc::from(annotation::create_annotator(&config.annotation)?);
    let engine = Arc::new(AnnotationEngine::new(
        Arc::clone(&db),
        annotator,
        Arc::clone(&similarity),
        config.annotation.max_embed_chars,
    ));

    let extractor: Option<Arc<dyn ContentExtractor>> = if config.ingest.extract_full_text {
        Some(Arc::new(HtmlExtractor::new(&config.ingest)?))
    } else {
        None
    };
    let ingestor = Arc::new(Ingestor::new(
        Arc::clone(&db),
        Arc::new(HttpFeedSource::new(&config.ingest)?),
        extractor,
    ));

    tracing::info!(db = %db_path.display(), "services ready");
    Ok(Services {
        db,
        similarity,
        engine,
        ingestor,
        config: Arc::new(config),
    })
}

impl Services {
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.db),
            Arc::clone(&self.ingestor),
            Arc::clone(&self.engine),
            self.config.scheduler.clone(),
            self.config.retention_horizon(),
        )
    }
}

pub fn clamp_hours(hours: i64) -> i64 {
    hours.clamp(1, 168)
}

pub fn clamp_days(days: i64) -> i64 {
    days.clamp(1, 90)
}

/// Result count for listings and similarity lookups, at least one.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE)
}

pub fn clamp_similarity(min_similarity: f64) -> f64 {
    if min_similarity.is_nan() {
        return 0.75;
    }
    min_similarity.clamp(0.5, 1.0)
}

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub similarity: Arc<dyn SimilarityIndex>,
    pub config: Arc<FeedmeshConfig>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{e:#}"))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct HoursParams {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DaysParams {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    pub hours: Option<i64>,
    pub min_similarity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Exact source domain, e.g. `www.example.com`.
    pub source: Option<String>,
    /// Only articles published within this many hours.
    pub hours: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    /// Newest-first store query with the caller limits applied.
    pub fn to_query(&self) -> ArticleQuery {
        ArticleQuery {
            published_since: self
                .hours
                .and_then(|h| analysis::window_start(clamp_hours(h))),
            source_domain: self
                .source
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase),
            newest_first: true,
            limit: Some(clamp_limit(self.limit.unwrap_or(20))),
            offset: self.offset,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ArticlesResponse {
    pub count: usize,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub article_id: i64,
    pub similar: Vec<RelatedArticle>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<RelatedArticle>,
}

#[derive(Debug, Serialize)]
pub struct CascadesResponse {
    pub time_window_hours: i64,
    pub cascades_detected: usize,
    pub cascades: Vec<Cascade>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub time_window_hours: i64,
    pub trending_topics: Vec<TrendingTopic>,
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub entity: String,
    pub days: i64,
    pub mentions: usize,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub total_sources: usize,
    pub sources: Vec<SourceStats>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: HealthReport,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/cascades", get(cascades))
        .route("/trending", get(trending))
        .route("/entities/{name}/timeline", get(timeline))
        .route("/sources", get(sources))
        .route("/graph", get(graph))
        .route("/articles", get(list_articles))
        .route("/articles/search", get(search))
        .route("/articles/{id}", get(article))
        .route("/articles/{id}/similar", get(similar))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let report = db::run_blocking(&state.db, |conn| db::check_database_health(conn)).await?;
    let status = if report.integrity_ok { "healthy" } else { "degraded" };
    Ok(Json(HealthResponse { status, report }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let path = state.config.resolved_db_path();
    let stats = db::run_blocking(&state.db, move |conn| {
        crate::articles::stats::article_stats(conn, Some(path.as_path()))
    })
    .await?;
    Ok(Json(stats))
}

async fn cascades(
    State(state): State<AppState>,
    Query(params): Query<HoursParams>,
) -> Result<Json<CascadesResponse>, ApiError> {
    let hours = clamp_hours(params.hours.unwrap_or(48));
    let mut cascades =
        db::run_blocking(&state.db, move |conn| analysis::detect_cascades(conn, hours)).await?;
    let cascades_detected = cascades.len();
    cascades.truncate(TOP_CASCADES);
    Ok(Json(CascadesResponse {
        time_window_hours: hours,
        cascades_detected,
        cascades,
    }))
}

async fn trending(
    State(state): State<AppState>,
    Query(params): Query<HoursParams>,
) -> Result<Json<TrendingResponse>, ApiError> {
    let hours = clamp_hours(params.hours.unwrap_or(24));
    let limit = state.config.analysis.trending_limit;
    let trending_topics =
        db::run_blocking(&state.db, move |conn| analysis::trending_topics(conn, hours, limit))
            .await?;
    Ok(Json(TrendingResponse {
        time_window_hours: hours,
        trending_topics,
    }))
}

async fn timeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<DaysParams>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let days = clamp_days(params.days.unwrap_or(30));
    let entity = name.clone();
    let timeline =
        db::run_blocking(&state.db, move |conn| analysis::entity_timeline(conn, &entity, days))
            .await?;
    Ok(Json(TimelineResponse {
        entity: name,
        days,
        mentions: timeline.len(),
        timeline,
    }))
}

async fn sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = db::run_blocking(&state.db, |conn| analysis::source_statistics(conn)).await?;
    Ok(Json(SourcesResponse {
        total_sources: sources.len(),
        sources,
    }))
}

async fn graph(
    State(state): State<AppState>,
    Query(params): Query<GraphParams>,
) -> Result<Json<KnowledgeGraph>, ApiError> {
    let hours = clamp_hours(params.hours.unwrap_or(48));
    let min_similarity = clamp_similarity(params.min_similarity.unwrap_or(0.75));
    let AppState {
        db,
        similarity,
        config,
    } = state;
    let graph = tokio::task::spawn_blocking(move || {
        analysis::build_graph(&db, similarity.as_ref(), hours, min_similarity, &config.analysis)
    })
    .await
    .context("graph task failed")??;
    Ok(Json(graph))
}

async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ArticlesResponse>, ApiError> {
    let filter = params.to_query();
    let articles =
        db::run_blocking(&state.db, move |conn| store::query_articles(conn, &filter)).await?;
    Ok(Json(ArticlesResponse {
        count: articles.len(),
        articles,
    }))
}

async fn article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    db::run_blocking(&state.db, move |conn| store::get_article(conn, id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("article {id} not found")))
}

async fn similar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let limit = clamp_limit(params.limit.unwrap_or(5));
    let AppState { db, similarity, .. } = state;
    let found = tokio::task::spawn_blocking(move || {
        analysis::similar_articles(&db, similarity.as_ref(), id, limit)
    })
    .await
    .context("similarity task failed")??;
    let similar = found.ok_or_else(|| ApiError::NotFound(format!("article {id} not found")))?;
    Ok(Json(SimilarResponse {
        article_id: id,
        similar,
    }))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let limit = clamp_limit(params.limit.unwrap_or(10));
    let AppState { db, similarity, .. } = state;
    let text = query.clone();
    let results = tokio::task::spawn_blocking(move || {
        analysis::search_articles(&db, similarity.as_ref(), &text, limit)
    })
    .await
    .context("search task failed")??;
    Ok(Json(SearchResponse { query, results }))
}

/// Run the scheduler and, when `server.http_bind` is set, the query API.
/// Returns after Ctrl-C, or with the scheduler's error if it fails.
pub async fn serve(config: FeedmeshConfig) -> Result<()> {
    let services = setup(config)?;
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            cancel.cancel();
        }
    });

    let scheduler_task = if services.config.scheduler.enabled {
        let scheduler = services.scheduler();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    } else {
        tracing::info!("scheduler disabled");
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            Ok::<(), anyhow::Error>(())
        })
    };

    let bind = services.config.server.http_bind.clone();
    let http_task = if bind.is_empty() {
        None
    } else {
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind {bind}"))?;
        tracing::info!(addr = %bind, "query API listening");
        let app = router(AppState {
            db: Arc::clone(&services.db),
            similarity: Arc::clone(&services.similarity),
            config: Arc::clone(&services.config),
        });
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        }))
    };

    let scheduled = scheduler_task.await.context("scheduler task failed")?;
    cancel.cancel();
    if let Some(task) = http_task {
        task.await
            .context("http task failed")?
            .context("http server failed")?;
    }
    tracing::info!("feedmesh stopped");
    scheduled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters_are_clamped() {
        assert_eq!(clamp_hours(0), 1);
        assert_eq!(clamp_hours(1000), 168);
        assert_eq!(clamp_hours(48), 48);
        assert_eq!(clamp_days(-3), 1);
        assert_eq!(clamp_days(365), 90);
        assert_eq!(clamp_similarity(0.1), 0.5);
        assert_eq!(clamp_similarity(1.5), 1.0);
        assert_eq!(clamp_similarity(f64::NAN), 0.75);
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(500), 100);
    }

    #[test]
    fn list_params_build_a_newest_first_page() {
        let params = ListParams {
            source: Some(" News.Example.com ".into()),
            hours: Some(1000),
            limit: None,
            offset: Some(40),
        };
        let query = params.to_query();
        assert_eq!(query.source_domain.as_deref(), Some("news.example.com"));
        assert!(query.newest_first);
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, Some(40));
        let since = query.published_since.unwrap();
        let span = chrono::Utc::now() - since;
        assert!(span <= chrono::Duration::hours(168) && span > chrono::Duration::hours(167));
        assert!(query.state.is_none());

        let unfiltered = ListParams::default().to_query();
        assert!(unfiltered.source_domain.is_none());
        assert!(unfiltered.published_since.is_none());
    }
}
