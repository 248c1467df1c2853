//! Article store: articles, feeds, retention and processing statistics.
//!
//! All functions take a borrowed [`rusqlite::Connection`]; callers decide
//! whether that is a test connection or the locked [`crate::db::SharedDb`].

pub mod feeds;
pub mod retention;
pub mod stats;
pub mod store;
pub mod types;

pub use retention::{evict_before, evict_older_than};
pub use store::{
    commit_annotation, get_article, insert_article, query_articles, AnnotationUpdate,
    ArticleQuery,
};
pub use types::{Article, EntityMention, Feed, NewArticle, ProcessingState, RawEntry};
