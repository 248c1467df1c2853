use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing state of an article. `Unprocessed → Processed` happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Unprocessed,
    Processed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Processed => "processed",
        }
    }

    pub fn from_flag(flag: bool) -> Self {
        if flag {
            Self::Processed
        } else {
            Self::Unprocessed
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity occurrence inside an article's annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
}

impl EntityMention {
    pub fn new(text: impl Into<String>, entity_type: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
            start,
            end,
        }
    }

    /// Identity key used when aggregating across articles.
    pub fn key(&self) -> String {
        self.text.to_lowercase()
    }
}

/// A stored article.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub source_domain: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub state: ProcessingState,
    pub embedding_handle: Option<String>,
    pub entities: Option<Vec<EntityMention>>,
    pub sentiment: Option<f64>,
}

impl Article {
    pub fn is_processed(&self) -> bool {
        self.state == ProcessingState::Processed
    }

    /// Text shown to the annotator: body, else summary, else title.
    pub fn annotation_text(&self) -> &str {
        [self.content.as_deref(), self.summary.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.title)
    }

    /// Text handed to the embedder: the title followed by at most
    /// `max_body_chars` characters of the body.
    pub fn embedding_text(&self, max_body_chars: usize) -> String {
        let body = [self.content.as_deref(), self.summary.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or("");
        let body: String = body.chars().take(max_body_chars).collect();
        if body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, body)
        }
    }
}

/// Entry exactly as a feed source reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Insert payload for a new article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub source_domain: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// A registered feed.
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub is_active: bool,
    pub last_fetched: Option<DateTime<Utc>>,
    pub fetch_interval_secs: i64,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// Whether the feed should be fetched at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(self.fetch_interval_secs),
        }
    }
}

/// Entity type labels produced by the annotators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Org,
    Gpe,
    Product,
    Event,
    Law,
    Norp,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Gpe => "GPE",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::Law => "LAW",
            Self::Norp => "NORP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(content: Option<&str>, summary: Option<&str>) -> Article {
        Article {
            id: 1,
            url: "https://a.example/1".into(),
            title: "Headline".into(),
            content: content.map(Into::into),
            summary: summary.map(Into::into),
            author: None,
            source_domain: "a.example".into(),
            published_at: None,
            fetched_at: Utc::now(),
            state: ProcessingState::Unprocessed,
            embedding_handle: None,
            entities: None,
            sentiment: None,
        }
    }

    #[test]
    fn annotation_text_falls_back() {
        assert_eq!(article(Some("body"), Some("sum")).annotation_text(), "body");
        assert_eq!(article(Some("  "), Some("sum")).annotation_text(), "sum");
        assert_eq!(article(None, None).annotation_text(), "Headline");
    }

    #[test]
    fn embedding_text_truncates_body() {
        let a = article(Some("abcdefgh"), None);
        assert_eq!(a.embedding_text(3), "Headline\n\nabc");
        assert_eq!(article(None, None).embedding_text(10), "Headline");
    }

    #[test]
    fn mention_serializes_type_field() {
        let m = EntityMention::new("Acme Corp", "ORG", 0, 9);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "ORG");
        assert_eq!(m.key(), "acme corp");
    }

    #[test]
    fn feed_due_after_interval() {
        let now = Utc::now();
        let mut feed = Feed {
            id: 1,
            url: "https://a.example/rss".into(),
            title: "A".into(),
            description: None,
            category: "general".into(),
            is_active: true,
            last_fetched: None,
            fetch_interval_secs: 1800,
            created_at: now,
        };
        assert!(feed.is_due(now));
        feed.last_fetched = Some(now - chrono::Duration::minutes(10));
        assert!(!feed.is_due(now));
        feed.last_fetched = Some(now - chrono::Duration::minutes(30));
        assert!(feed.is_due(now));
    }
}
