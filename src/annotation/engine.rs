use std::sync::Arc;

use anyhow::Result;

use super::{AnnotateError, Annotator};
use crate::articles::store::{self, AnnotationUpdate};
use crate::articles::Article;
use crate::db::{self, SharedDb};
use crate::similarity::{SimilarityIndex, VectorMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotateOutcome {
    /// Annotation committed. `indexed` is false when the similarity step failed.
    Processed { indexed: bool },
    AlreadyProcessed,
    NotFound,
}

/// Applies the annotation and similarity capabilities to stored articles.
///
/// The database lock is only held for the load and for the final commit, so
/// capability calls never block other workers or readers.
pub struct AnnotationEngine {
    db: SharedDb,
    annotator: Arc<dyn Annotator>,
    similarity: Arc<dyn SimilarityIndex>,
    max_embed_chars: usize,
}

impl AnnotationEngine {
    pub fn new(
        db: SharedDb,
        annotator: Arc<dyn Annotator>,
        similarity: Arc<dyn SimilarityIndex>,
        max_embed_chars: usize,
    ) -> Self {
        Self {
            db,
            annotator,
            similarity,
            max_embed_chars,
        }
    }

    /// Annotate one article and move it to the processed state.
    ///
    /// Missing and already-processed articles are a no-op that touches no
    /// capability. Annotator failure leaves the article unprocessed; similarity
    /// failure still commits, with a null handle.
    pub fn annotate(&self, article_id: i64) -> Result<AnnotateOutcome, AnnotateError> {
        let article = {
            let conn = db::lock(&self.db)?;
            store::get_article(&conn, article_id)?
        };
        let Some(article) = article else {
            tracing::debug!(article_id, "article not found, skipping annotation");
            return Ok(AnnotateOutcome::NotFound);
        };
        if article.is_processed() {
            return Ok(AnnotateOutcome::AlreadyProcessed);
        }

        let text = article.annotation_text();
        let (entities, sentiment) = self
            .annotator
            .extract_entities(text)
            .and_then(|entities| Ok((entities, self.annotator.sentiment(text)?)))
            .map_err(|reason| AnnotateError::Annotation { article_id, reason })?;

        let embedding_handle = match self.index_article(&article) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(article_id, error = %e, "similarity indexing failed, committing without handle");
                None
            }
        };

        let update = AnnotationUpdate {
            entities,
            sentiment,
            embedding_handle,
        };
        let committed = {
            let conn = db::lock(&self.db)?;
            store::commit_annotation(&conn, article_id, &update)?
        };

        if !committed {
            // Another worker won, or retention removed the row meanwhile.
            if let Some(ref handle) = update.embedding_handle {
                if let Err(e) = self.similarity.remove(handle) {
                    tracing::warn!(article_id, error = %e, "failed to drop orphaned vector");
                }
            }
            return Ok(AnnotateOutcome::AlreadyProcessed);
        }

        let indexed = update.embedding_handle.is_some();
        tracing::info!(
            article_id,
            entities = update.entities.len(),
            sentiment = update.sentiment,
            indexed,
            "article annotated"
        );
        Ok(AnnotateOutcome::Processed { indexed })
    }

    fn index_article(&self, article: &Article) -> Result<String> {
        let vector = self
            .similarity
            .embed(&article.embedding_text(self.max_embed_chars))?;
        self.similarity.index(
            article.id,
            &vector,
            &VectorMetadata {
                title: article.title.clone(),
                source_domain: article.source_domain.clone(),
                published_at: article.published_at,
            },
        )
    }

    /// Index processed articles that have no similarity handle yet. Returns
    /// how many were indexed; failures are logged and skipped.
    pub fn reindex_missing(&self) -> Result<usize> {
        let pending = {
            let conn = db::lock(&self.db)?;
            store::unindexed_processed(&conn)?
        };
        tracing::info!(pending = pending.len(), "reindexing processed articles without vectors");

        let mut indexed = 0;
        for article in &pending {
            let handle = match self.index_article(article) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(article_id = article.id, error = %e, "reindex failed");
                    continue;
                }
            };
            let attached = {
                let conn = db::lock(&self.db)?;
                store::set_embedding_handle(&conn, article.id, &handle)?
            };
            if attached {
                indexed += 1;
            } else {
                self.similarity.remove(&handle)?;
            }
        }
        Ok(indexed)
    }
}
