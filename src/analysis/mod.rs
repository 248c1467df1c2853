//! Pattern detection, knowledge-graph assembly and similarity lookups over
//! processed articles.
//!
//! Every query reads one snapshot of the windowed articles and works on it in
//! memory. Non-positive windows yield empty results.

pub mod cascades;
pub mod graph;
pub mod related;
pub mod sources;
pub mod timeline;
pub mod trending;

pub use cascades::{detect_cascades, Cascade, CascadeArticle};
pub use graph::{build_graph, GraphNode, KnowledgeGraph};
pub use related::{search_articles, similar_articles, RelatedArticle};
pub use sources::{source_statistics, SourceStats};
pub use timeline::{entity_timeline, TimelineEntry};
pub use trending::{trending_topics, TrendingTopic};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::articles::{store, Article, ArticleQuery};

/// Start of a window reaching `hours` back from now. `None` for an empty window.
pub fn window_start(hours: i64) -> Option<DateTime<Utc>> {
    window_start_at(Utc::now(), Duration::try_hours(hours), hours > 0)
}

pub(crate) fn window_start_days(days: i64) -> Option<DateTime<Utc>> {
    window_start_at(Utc::now(), Duration::try_days(days), days > 0)
}

fn window_start_at(
    now: DateTime<Utc>,
    span: Option<Duration>,
    positive: bool,
) -> Option<DateTime<Utc>> {
    if !positive {
        return None;
    }
    Some(
        span.and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
    )
}

/// Processed articles published inside the window, oldest first.
pub(crate) fn load_window(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<Article>> {
    store::query_articles(conn, &ArticleQuery::processed_since(since))
}

/// One entity occurrence expanded with its article context.
pub(crate) struct Mention<'a> {
    pub text: &'a str,
    pub key: String,
    pub entity_type: &'a str,
    pub article: &'a Article,
}

/// Expand every stored mention of dated articles, in article order.
pub(crate) fn mentions(articles: &[Article]) -> impl Iterator<Item = Mention<'_>> {
    articles
        .iter()
        .filter(|a| a.published_at.is_some())
        .flat_map(|article| {
            article
                .entities
                .iter()
                .flatten()
                .map(move |m| Mention {
                    text: &m.text,
                    key: m.key(),
                    entity_type: &m.entity_type,
                    article,
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_huge_windows() {
        assert!(window_start(0).is_none());
        assert!(window_start(-5).is_none());
        assert!(window_start_days(0).is_none());
        assert_eq!(window_start(i64::MAX), Some(DateTime::<Utc>::MIN_UTC));

        let since = window_start(24).unwrap();
        let elapsed = Utc::now() - since;
        assert!(elapsed >= Duration::hours(24));
        assert!(elapsed < Duration::hours(25));
    }
}
