use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedmeshConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub annotation: AnnotationConfig,
    pub ingest: IngestConfig,
    pub scheduler: SchedulerConfig,
    pub analysis: AnalysisConfig,
    /// Feeds registered on first start, when the feed table is still empty.
    pub feeds: Vec<FeedSeed>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    /// Bind address for the read-only query API. Empty disables it.
    pub http_bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnnotationConfig {
    pub provider: String,
    /// Text beyond this many characters is not shown to the annotator.
    pub max_text_chars: usize,
    /// Body characters appended to the title before embedding.
    pub max_embed_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub extract_full_text: bool,
    pub max_entries_per_feed: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub annotation_workers: usize,
    pub feed_concurrency: usize,
    pub retention_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub trending_limit: usize,
    pub graph_article_limit: usize,
    pub graph_neighbor_sample: usize,
    pub graph_neighbors_k: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeedSeed {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".into()
}

impl Default for FeedmeshConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            annotation: AnnotationConfig::default(),
            ingest: IngestConfig::default(),
            scheduler: SchedulerConfig::default(),
            analysis: AnalysisConfig::default(),
            feeds: default_feeds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            http_bind: "127.0.0.1:8700".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_feedmesh_dir()
            .join("feedmesh.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_feedmesh_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            provider: "heuristic".into(),
            max_text_chars: 1_000_000,
            max_embed_chars: 5000,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("feedmesh/", env!("CARGO_PKG_VERSION")).into(),
            request_timeout_secs: 15,
            extract_full_text: true,
            max_entries_per_feed: 50,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            annotation_workers: 4,
            feed_concurrency: 4,
            retention_days: 30,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            trending_limit: 20,
            graph_article_limit: 50,
            graph_neighbor_sample: 20,
            graph_neighbors_k: 3,
        }
    }
}

fn seed(url: &str, title: &str, description: &str) -> FeedSeed {
    FeedSeed {
        url: url.into(),
        title: title.into(),
        description: Some(description.into()),
        category: "technology".into(),
    }
}

/// Technology news feeds registered when no feeds exist yet.
pub fn default_feeds() -> Vec<FeedSeed> {
    vec![
        seed("https://techcrunch.com/feed/", "TechCrunch", "Startup and technology news"),
        seed("https://www.theverge.com/rss/index.xml", "The Verge", "Technology, science, art, and culture"),
        seed("https://www.wired.com/feed/rss", "Wired", "Emerging technology, culture, economy, and politics"),
        seed("https://hnrss.org/frontpage", "Hacker News", "Hacker News front page"),
        seed("https://rss.nytimes.com/services/xml/rss/nyt/Technology.xml", "NYTimes Technology", "New York Times technology desk"),
        seed("https://feeds.arstechnica.com/arstechnica/index", "Ars Technica", "Technology news, analysis, and reviews"),
        seed("https://www.engadget.com/rss.xml", "Engadget", "Consumer electronics and gadgets"),
        seed("https://feeds.bbci.co.uk/news/technology/rss.xml", "BBC Technology", "BBC technology news"),
        seed("https://www.technologyreview.com/feed/", "MIT Technology Review", "MIT's magazine of innovation"),
        seed("https://feeds.feedburner.com/venturebeat/SZYF", "VentureBeat", "Technology business news"),
    ]
}

/// Returns `~/.feedmesh/`
pub fn default_feedmesh_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".feedmesh")
}

/// Returns the default config file path: `~/.feedmesh/config.toml`
pub fn default_config_path() -> PathBuf {
    default_feedmesh_dir().join("config.toml")
}

impl FeedmeshConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FeedmeshConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (FEEDMESH_DB, FEEDMESH_LOG_LEVEL, FEEDMESH_HTTP_BIND).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FEEDMESH_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("FEEDMESH_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("FEEDMESH_HTTP_BIND") {
            self.server.http_bind = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.scheduler.retention_days.max(1))
            .unwrap_or_else(|| chrono::Duration::days(30))
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FeedmeshConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.scheduler.interval_minutes, 30);
        assert_eq!(config.scheduler.annotation_workers, 4);
        assert_eq!(config.analysis.trending_limit, 20);
        assert_eq!(config.analysis.graph_article_limit, 50);
        assert_eq!(config.feeds.len(), 10);
        assert!(config.storage.db_path.ends_with("feedmesh.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[scheduler]
interval_minutes = 5
retention_days = 3

[[feeds]]
url = "https://example.com/rss"
title = "Example"
"#;
        let config: FeedmeshConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.scheduler.interval_minutes, 5);
        assert_eq!(config.retention_horizon(), chrono::Duration::days(3));
        // explicit feeds replace the default list
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].category, "general");
        // defaults still apply for unset fields
        assert_eq!(config.scheduler.annotation_workers, 4);
        assert_eq!(config.analysis.graph_neighbors_k, 3);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = FeedmeshConfig::default();
        std::env::set_var("FEEDMESH_DB", "/tmp/override.db");
        std::env::set_var("FEEDMESH_LOG_LEVEL", "trace");
        std::env::set_var("FEEDMESH_HTTP_BIND", "0.0.0.0:9000");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.server.http_bind, "0.0.0.0:9000");

        std::env::remove_var("FEEDMESH_DB");
        std::env::remove_var("FEEDMESH_LOG_LEVEL");
        std::env::remove_var("FEEDMESH_HTTP_BIND");
    }
}
