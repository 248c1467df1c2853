//! Cross-source pattern and trend analysis over news feeds.
//!
//! Feedmesh polls RSS/Atom feeds, stores each article once (deduplicated by
//! URL), annotates it with named entities, a sentiment score and an embedding,
//! and expires it after a retention horizon. On top of that store it answers
//! analytical queries:
//!
//! | Query | Default window | Result |
//! |-------|----------------|--------|
//! | **Cascades** | 48 hours | Entities reported by two or more sources, with velocity |
//! | **Trending** | 24 hours | Most mentioned entities |
//! | **Timeline** | 30 days | Articles mentioning one entity, oldest first |
//! | **Sources** | all time | Article count and mean sentiment per domain |
//! | **Graph** | 48 hours | Articles, shared entities and similarity edges |
//! | **Similar** | all time | Nearest indexed articles to one article |
//! | **Search** | all time | Nearest indexed articles to a free-text query |
//!
//! # Architecture
//!
//! - **Storage**: SQLite, with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   holding article embeddings
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Pipeline**: a cancellable scheduler that evicts, fetches, annotates and
//!   evicts again on every cycle
//! - **Transport**: JSON over HTTP (axum) and a CLI
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: connection setup, schema, migrations and health checks
//! - [`articles`]: the article and feed store, retention and statistics
//! - [`ingest`]: feed fetching, full-text extraction and persistence
//! - [`annotation`]: entity extraction, sentiment and indexing of one article
//! - [`embedding`] / [`similarity`]: text vectors and nearest-neighbour lookup
//! - [`analysis`]: cascades, trending, timeline, source statistics, the graph
//!   and similarity lookups
//! - [`scheduler`]: the periodic pipeline
//! - [`server`]: service wiring and the HTTP query API

pub mod analysis;
pub mod annotation;
pub mod articles;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod scheduler;
pub mod server;
pub mod similarity;
