use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The annotator failed; the article stays unprocessed.
    #[error("annotation failed for article {article_id}: {reason:#}")]
    Annotation {
        article_id: i64,
        reason: anyhow::Error,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
