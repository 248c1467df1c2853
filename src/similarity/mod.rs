//! Similarity capability: embed article text, index it, and look up neighbours.
//!
//! The [`SimilarityIndex`] trait is what the annotation engine and the graph
//! builder see. [`VecIndex`] backs it with the sqlite-vec `articles_vec` table
//! and an [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).

mod vec_index;

pub use vec_index::VecIndex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata stored next to an indexed vector.
#[derive(Debug, Clone)]
pub struct VectorMetadata {
    pub title: String,
    pub source_domain: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// What to search around.
#[derive(Debug, Clone)]
pub enum SimilarityQuery {
    Vector(Vec<f32>),
    /// Neighbours of an already indexed article; the article itself is excluded.
    Article(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub article_id: i64,
    /// Cosine similarity, 1.0 for identical direction.
    pub score: f64,
}

/// Synchronous similarity backend. Implementations lock whatever they share
/// internally, so callers must not hold the database lock while calling in.
pub trait SimilarityIndex: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Index `vector` for `article_id`, replacing any earlier entry for the
    /// same article. Returns the new handle.
    fn index(&self, article_id: i64, vector: &[f32], metadata: &VectorMetadata) -> Result<String>;

    /// Up to `k` neighbours ordered by descending score.
    fn nearest(&self, query: &SimilarityQuery, k: usize) -> Result<Vec<Neighbor>>;

    /// Drop an entry. Unknown handles are ignored.
    fn remove(&self, handle: &str) -> Result<()>;
}

/// Stand-in used when no embedding model could be loaded. Annotation still
/// proceeds and leaves the similarity handle empty for a later `reindex`.
pub struct UnavailableIndex {
    reason: String,
}

impl UnavailableIndex {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SimilarityIndex for UnavailableIndex {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("similarity index unavailable: {}", self.reason)
    }

    fn index(&self, _article_id: i64, _vector: &[f32], _metadata: &VectorMetadata) -> Result<String> {
        anyhow::bail!("similarity index unavailable: {}", self.reason)
    }

    fn nearest(&self, _query: &SimilarityQuery, _k: usize) -> Result<Vec<Neighbor>> {
        anyhow::bail!("similarity index unavailable: {}", self.reason)
    }

    fn remove(&self, _handle: &str) -> Result<()> {
        Ok(())
    }
}
