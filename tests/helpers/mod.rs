#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use feedmesh::annotation::Annotator;
use feedmesh::articles::store::{self, AnnotationUpdate};
use feedmesh::articles::{EntityMention, NewArticle, RawEntry};
use feedmesh::db::{self, SharedDb};
use feedmesh::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use feedmesh::ingest::{ContentExtractor, FeedSource};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn shared_test_db() -> SharedDb {
    db::shared(test_db())
}

/// Deterministic 384-dim embedding with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// Unit vector close to `base`: cosine similarity well above 0.95.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..5 {
        v[(i * 37 + 1) % EMBEDDING_DIM] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(h)
}

pub fn new_article(url: &str, domain: &str, published: Option<DateTime<Utc>>) -> NewArticle {
    NewArticle {
        url: url.to_string(),
        title: format!("Story at {url}"),
        content: None,
        summary: Some("Summary text".to_string()),
        author: None,
        source_domain: domain.to_string(),
        published_at: published,
        fetched_at: Utc::now(),
    }
}

/// Insert an article and commit an annotation for it directly. `entities`
/// are (text, type) pairs.
pub fn insert_processed(
    conn: &Connection,
    url: &str,
    domain: &str,
    published: DateTime<Utc>,
    entities: &[(&str, &str)],
    sentiment: f64,
) -> i64 {
    let id = store::insert_article(conn, &new_article(url, domain, Some(published)))
        .unwrap()
        .unwrap();
    let update = AnnotationUpdate {
        entities: entities
            .iter()
            .map(|(text, kind)| EntityMention::new(*text, *kind, 0, text.len()))
            .collect(),
        sentiment,
        embedding_handle: None,
    };
    assert!(store::commit_annotation(conn, id, &update).unwrap());
    id
}

pub fn entry(title: &str, link: &str) -> RawEntry {
    RawEntry {
        title: title.to_string(),
        link: link.to_string(),
        summary: Some(format!("{title} summary")),
        author: None,
        published: Some(Utc::now()),
    }
}

/// Feed source serving canned entries. Unknown URLs fail.
#[derive(Default)]
pub struct MockFeedSource {
    feeds: HashMap<String, Vec<RawEntry>>,
    pub calls: AtomicUsize,
}

impl MockFeedSource {
    pub fn with_feed(mut self, url: &str, entries: Vec<RawEntry>) -> Self {
        self.feeds.insert(url.to_string(), entries);
        self
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused: {url}"))
    }
}

/// Extractor that returns a fixed body, or fails for every URL.
pub struct MockExtractor {
    pub body: Option<String>,
    pub fail: bool,
}

#[async_trait]
impl ContentExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> Result<Option<String>> {
        if self.fail {
            anyhow::bail!("timeout fetching {url}");
        }
        Ok(self.body.clone())
    }
}

/// Annotator returning fixed output and counting calls.
pub struct CountingAnnotator {
    pub entities: Vec<EntityMention>,
    pub sentiment: f64,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CountingAnnotator {
    pub fn new(entities: &[(&str, &str)], sentiment: f64) -> Self {
        Self {
            entities: entities
                .iter()
                .map(|(text, kind)| EntityMention::new(*text, *kind, 0, text.len()))
                .collect(),
            sentiment,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[], 0.0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Annotator for CountingAnnotator {
    fn extract_entities(&self, _text: &str) -> Result<Vec<EntityMention>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("model crashed");
        }
        Ok(self.entities.clone())
    }

    fn sentiment(&self, _text: &str) -> Result<f64> {
        if self.fail {
            anyhow::bail!("model crashed");
        }
        Ok(self.sentiment)
    }
}

/// Embedder that maps text to preset vectors by title prefix, falling back
/// to a spike keyed on the text length.
#[derive(Default)]
pub struct TableEmbedder {
    pub vectors: Mutex<Vec<(String, Vec<f32>)>>,
}

impl TableEmbedder {
    pub fn set(&self, title: &str, vector: Vec<f32>) {
        self.vectors.lock().unwrap().push((title.to_string(), vector));
    }
}

impl EmbeddingProvider for TableEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let table = self.vectors.lock().unwrap();
        if let Some((_, v)) = table.iter().find(|(title, _)| text.starts_with(title.as_str())) {
            return Ok(v.clone());
        }
        Ok(test_embedding(text.len()))
    }
}

pub fn table_embedder() -> Arc<TableEmbedder> {
    Arc::new(TableEmbedder::default())
}

/// Annotator that sleeps inside every entity extraction and records how many
/// calls overlapped. Text containing `fail_marker` makes the call fail.
pub struct SlowAnnotator {
    delay: std::time::Duration,
    fail_marker: Option<String>,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowAnnotator {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            fail_marker: None,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Highest number of extractions observed running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Annotator for SlowAnnotator {
    fn extract_entities(&self, text: &str) -> Result<Vec<EntityMention>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(ref marker) = self.fail_marker {
            if text.contains(marker.as_str()) {
                anyhow::bail!("annotator rejected input");
            }
        }
        Ok(vec![EntityMention::new("Acme Corp", "ORG", 0, 9)])
    }

    fn sentiment(&self, _text: &str) -> Result<f64> {
        Ok(0.1)
    }
}
