mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use feedmesh::config::{FeedSeed, FeedmeshConfig};
use feedmesh::server::ListParams;

#[derive(Parser)]
#[command(
    name = "feedmesh",
    version,
    about = "Cross-source cascade detection and trend analysis over news feeds"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background pipeline and the HTTP query API
    Serve,
    /// Run one ingestion cycle now
    Fetch {
        /// Only this feed, ignoring its fetch interval
        #[arg(long)]
        feed: Option<String>,
    },
    /// Manage registered feeds
    Feeds {
        #[command(subcommand)]
        action: FeedsAction,
    },
    /// Entities reported by several sources
    Cascades {
        #[arg(long, default_value_t = 48)]
        hours: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Most mentioned entities
    Trending {
        #[arg(long, default_value_t = 24)]
        hours: i64,
        #[arg(long)]
        json: bool,
    },
    /// Articles mentioning an entity, oldest first
    Timeline {
        entity: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Article counts and mean sentiment per source
    Sources {
        #[arg(long)]
        json: bool,
    },
    /// Knowledge graph of recent articles and shared entities
    Graph {
        #[arg(long, default_value_t = 48)]
        hours: i64,
        #[arg(long, default_value_t = 0.75)]
        min_similarity: f64,
        #[arg(long)]
        json: bool,
    },
    /// List stored articles, newest first
    Articles {
        /// Only this source domain
        #[arg(long)]
        source: Option<String>,
        /// Only articles published within this many hours
        #[arg(long)]
        hours: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Articles closest to a stored article
    Similar {
        id: i64,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Semantic search over indexed articles
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Delete articles past the retention horizon
    Evict {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Embed processed articles that have no vector yet
    Reindex,
    /// Show processing statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Check database health
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum FeedsAction {
    /// Register a feed
    Add {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List registered feeds
    List {
        #[arg(long)]
        json: bool,
    },
    /// Resume fetching a feed
    Enable { url: String },
    /// Stop fetching a feed
    Disable { url: String },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.feedmesh/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FeedmeshConfig::load()?;

    // stdout carries command output; logs go to stderr.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => feedmesh::server::serve(config).await?,
        Command::Fetch { feed } => cli::pipeline::fetch(config, feed).await?,
        Command::Feeds { action } => match action {
            FeedsAction::Add {
                url,
                title,
                category,
                description,
            } => {
                let title = title.unwrap_or_else(|| url.clone());
                cli::feeds::add(
                    &config,
                    FeedSeed {
                        url,
                        title,
                        description,
                        category,
                    },
                )?
            }
            FeedsAction::List { json } => cli::feeds::list(&config, json)?,
            FeedsAction::Enable { url } => cli::feeds::set_active(&config, &url, true)?,
            FeedsAction::Disable { url } => cli::feeds::set_active(&config, &url, false)?,
        },
        Command::Cascades { hours, limit, json } => cli::query::cascades(&config, hours, limit, json)?,
        Command::Trending { hours, json } => cli::query::trending(&config, hours, json)?,
        Command::Timeline { entity, days, json } => {
            cli::query::timeline(&config, &entity, days, json)?
        }
        Command::Sources { json } => cli::query::sources(&config, json)?,
        Command::Graph {
            hours,
            min_similarity,
            json,
        } => cli::query::graph(config, hours, min_similarity, json)?,
        Command::Articles {
            source,
            hours,
            limit,
            offset,
            json,
        } => cli::query::articles(
            &config,
            ListParams {
                source,
                hours,
                limit: Some(limit),
                offset,
            },
            json,
        )?,
        Command::Similar { id, limit, json } => cli::query::similar(config, id, limit, json)?,
        Command::Search { query, limit, json } => cli::query::search(config, &query, limit, json)?,
        Command::Evict { days } => cli::pipeline::evict(&config, days)?,
        Command::Reindex => cli::pipeline::reindex(config).await?,
        Command::Stats { json } => cli::stats::stats(&config, json)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
