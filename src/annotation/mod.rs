//! Annotation capability and the engine that applies it to stored articles.

mod engine;
mod error;
pub mod heuristic;

pub use engine::{AnnotateOutcome, AnnotationEngine};
pub use error::AnnotateError;
pub use heuristic::HeuristicAnnotator;

use anyhow::Result;

use crate::articles::EntityMention;

/// Named-entity extraction and sentiment scoring over plain text.
pub trait Annotator: Send + Sync {
    /// Mentions deduplicated on (lowercase text, type), in order of first appearance.
    fn extract_entities(&self, text: &str) -> Result<Vec<EntityMention>>;

    /// Polarity in [-1, 1].
    fn sentiment(&self, text: &str) -> Result<f64>;
}

/// Build the configured annotator.
pub fn create_annotator(config: &crate::config::AnnotationConfig) -> Result<Box<dyn Annotator>> {
    match config.provider.as_str() {
        "heuristic" => Ok(Box::new(HeuristicAnnotator::new(config.max_text_chars))),
        other => anyhow::bail!("unknown annotation provider: {other}. Supported: heuristic"),
    }
}
