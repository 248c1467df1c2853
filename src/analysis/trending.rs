//! Most-mentioned entities in a window.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::{load_window, mentions, window_start};
use crate::articles::Article;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingTopic {
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub count: usize,
}

#[derive(Default)]
struct Tally {
    first_seen: usize,
    count: usize,
    /// type -> (count, last position observed)
    types: HashMap<String, (usize, usize)>,
}

impl Tally {
    /// Most frequent type; a tie goes to the type observed most recently.
    fn dominant_type(&self) -> String {
        self.types
            .iter()
            .max_by_key(|(_, seen)| **seen)
            .map(|(t, _)| t.clone())
            .unwrap_or_default()
    }
}

pub fn trending_topics(conn: &Connection, hours: i64, limit: usize) -> Result<Vec<TrendingTopic>> {
    let Some(since) = window_start(hours) else {
        return Ok(vec![]);
    };
    let articles = load_window(conn, since)?;
    Ok(trending_from(&articles, limit))
}

/// Count raw mentions per lowercase key, highest first. Equal counts keep
/// first-seen order.
pub fn trending_from(articles: &[Article], limit: usize) -> Vec<TrendingTopic> {
    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for (pos, m) in mentions(articles).enumerate() {
        let tally = tallies.entry(m.key).or_insert_with(|| Tally {
            first_seen: pos,
            ..Default::default()
        });
        tally.count += 1;
        let slot = tally.types.entry(m.entity_type.to_string()).or_default();
        slot.0 += 1;
        slot.1 = pos;
    }

    let mut ranked: Vec<(String, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(entity, tally)| TrendingTopic {
            entity_type: tally.dominant_type(),
            count: tally.count,
            entity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles::{EntityMention, ProcessingState};
    use chrono::Utc;

    fn article(id: i64, entities: &[(&str, &str)]) -> Article {
        Article {
            id,
            url: format!("https://a.example/{id}"),
            title: "t".into(),
            content: None,
            summary: None,
            author: None,
            source_domain: "a.example".into(),
            published_at: Some(Utc::now()),
            fetched_at: Utc::now(),
            state: ProcessingState::Processed,
            embedding_handle: None,
            entities: Some(
                entities
                    .iter()
                    .map(|(t, k)| EntityMention::new(*t, *k, 0, 1))
                    .collect(),
            ),
            sentiment: None,
        }
    }

    #[test]
    fn majority_type_wins() {
        let articles = vec![
            article(1, &[("Jordan", "PERSON")]),
            article(2, &[("Jordan", "PERSON")]),
            article(3, &[("jordan", "GPE")]),
        ];
        let topics = trending_from(&articles, 20);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].entity, "jordan");
        assert_eq!(topics[0].entity_type, "PERSON");
        assert_eq!(topics[0].count, 3);
    }

    #[test]
    fn type_tie_goes_to_latest() {
        let articles = vec![
            article(1, &[("Jordan", "PERSON")]),
            article(2, &[("Jordan", "GPE")]),
        ];
        assert_eq!(trending_from(&articles, 20)[0].entity_type, "GPE");
    }

    #[test]
    fn equal_counts_keep_first_seen_order() {
        let articles = vec![
            article(1, &[("Beta", "ORG"), ("Alpha", "ORG")]),
            article(2, &[("Alpha", "ORG"), ("Beta", "ORG"), ("Gamma", "ORG")]),
        ];
        let names: Vec<_> = trending_from(&articles, 20)
            .into_iter()
            .map(|t| t.entity)
            .collect();
        assert_eq!(names, vec!["beta", "alpha", "gamma"]);
    }
}
