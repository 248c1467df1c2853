//! Knowledge graph of recent articles, the entities they share, and
//! similarity links between them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::window_start;
use crate::articles::{store, Article, ArticleQuery, ProcessingState};
use crate::config::AnalysisConfig;
use crate::db::{self, to_db_time};
use crate::similarity::{SimilarityIndex, SimilarityQuery};

const ARTICLE_NODE_SIZE: u32 = 8;
const LABEL_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    Article {
        id: String,
        label: String,
        source: String,
        url: String,
        published: Option<String>,
        size: u32,
    },
    Entity {
        id: String,
        label: String,
        entity_type: String,
        mention_count: usize,
        size: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Mentions,
    Similar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub article_count: usize,
    pub entity_count: usize,
    pub connection_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub stats: GraphStats,
}

fn article_node_id(id: i64) -> String {
    format!("article_{id}")
}

fn entity_node_id(key: &str) -> String {
    format!("entity_{key}")
}

fn title_case(key: &str) -> String {
    key.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn article_label(title: &str) -> String {
    if title.chars().count() > LABEL_CHARS {
        let cut: String = title.chars().take(LABEL_CHARS).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

/// Snapshot the window and assemble the graph. The connection lock is
/// released before the similarity index is consulted.
pub fn build_graph(
    conn: &Mutex<Connection>,
    similarity: &dyn SimilarityIndex,
    hours: i64,
    min_similarity: f64,
    config: &AnalysisConfig,
) -> Result<KnowledgeGraph> {
    let Some(since) = window_start(hours) else {
        return Ok(KnowledgeGraph::default());
    };
    let articles = {
        let conn = db::lock(conn)?;
        store::query_articles(
            &conn,
            &ArticleQuery {
                published_since: Some(since),
                state: Some(ProcessingState::Processed),
                newest_first: true,
                limit: Some(config.graph_article_limit),
                ..Default::default()
            },
        )?
    };
    Ok(assemble(&articles, similarity, min_similarity, config))
}

#[derive(Default)]
struct EntityTally {
    articles: HashSet<i64>,
    /// type -> (count, last position observed)
    types: HashMap<String, (usize, usize)>,
}

/// Build nodes and links for an article snapshot, newest first.
pub fn assemble(
    articles: &[Article],
    similarity: &dyn SimilarityIndex,
    min_similarity: f64,
    config: &AnalysisConfig,
) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::default();

    let mut tallies: HashMap<String, EntityTally> = HashMap::new();
    let mut entity_order: Vec<String> = Vec::new();
    let mut pos = 0usize;
    for article in articles {
        graph.nodes.push(GraphNode::Article {
            id: article_node_id(article.id),
            label: article_label(&article.title),
            source: article.source_domain.clone(),
            url: article.url.clone(),
            published: article.published_at.as_ref().map(to_db_time),
            size: ARTICLE_NODE_SIZE,
        });
        for mention in article.entities.iter().flatten() {
            let key = mention.key();
            let tally = tallies.entry(key.clone()).or_insert_with(|| {
                entity_order.push(key);
                EntityTally::default()
            });
            tally.articles.insert(article.id);
            let seen = tally.types.entry(mention.entity_type.clone()).or_default();
            seen.0 += 1;
            seen.1 = pos;
            pos += 1;
        }
    }

    let qualifying: HashSet<&str> = entity_order
        .iter()
        .filter(|key| tallies[key.as_str()].articles.len() >= 2)
        .map(String::as_str)
        .collect();

    for key in entity_order.iter().filter(|k| qualifying.contains(k.as_str())) {
        let tally = &tallies[key];
        let count = tally.articles.len();
        let entity_type = tally
            .types
            .iter()
            .max_by_key(|(_, seen)| **seen)
            .map(|(t, _)| t.clone())
            .unwrap_or_default();
        graph.nodes.push(GraphNode::Entity {
            id: entity_node_id(key),
            label: title_case(key),
            entity_type,
            mention_count: count,
            size: (8 + 2 * count as u32).min(20),
        });
    }

    for article in articles {
        let mut linked = HashSet::new();
        for mention in article.entities.iter().flatten() {
            let key = mention.key();
            if qualifying.contains(key.as_str()) && linked.insert(key.clone()) {
                graph.links.push(GraphLink {
                    source: article_node_id(article.id),
                    target: entity_node_id(&key),
                    kind: LinkKind::Mentions,
                    similarity: None,
                });
            }
        }
    }

    let in_window: HashSet<i64> = articles.iter().map(|a| a.id).collect();
    let mut paired: HashSet<(i64, i64)> = HashSet::new();
    for article in articles.iter().take(config.graph_neighbor_sample) {
        let neighbors = match similarity.nearest(
            &SimilarityQuery::Article(article.id),
            config.graph_neighbors_k,
        ) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(article_id = article.id, error = %e, "neighbour lookup failed");
                continue;
            }
        };
        for n in neighbors {
            if n.article_id == article.id
                || n.score < min_similarity
                || !in_window.contains(&n.article_id)
            {
                continue;
            }
            let pair = (article.id.min(n.article_id), article.id.max(n.article_id));
            if paired.insert(pair) {
                graph.links.push(GraphLink {
                    source: article_node_id(article.id),
                    target: article_node_id(n.article_id),
                    kind: LinkKind::Similar,
                    similarity: Some((n.score * 100.0).round() / 100.0),
                });
            }
        }
    }

    graph.stats = GraphStats {
        article_count: articles.len(),
        entity_count: qualifying.len(),
        connection_count: graph.links.len(),
    };
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(title_case("acme corp"), "Acme Corp");
        assert_eq!(article_label("short"), "short");
        let long = "x".repeat(60);
        assert_eq!(article_label(&long), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn node_serializes_with_type_tag() {
        let node = GraphNode::Entity {
            id: entity_node_id("acme corp"),
            label: "Acme Corp".into(),
            entity_type: "ORG".into(),
            mention_count: 3,
            size: 14,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "entity");
        assert_eq!(json["id"], "entity_acme corp");
        assert_eq!(json["entity_type"], "ORG");
    }
}
