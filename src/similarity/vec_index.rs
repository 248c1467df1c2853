use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{Neighbor, SimilarityIndex, SimilarityQuery, VectorMetadata};
use crate::db::{self, to_db_time, SharedDb};
use crate::embedding::{bytes_to_embedding, embedding_to_bytes, l2_to_cosine, EmbeddingProvider};

/// sqlite-vec backed index living in the same database as the articles.
pub struct VecIndex {
    db: SharedDb,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VecIndex {
    pub fn new(db: SharedDb, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }

    fn knn(conn: &rusqlite::Connection, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let mut stmt = conn.prepare(
            "SELECT v.article_id, knn.distance
             FROM (SELECT handle, distance FROM articles_vec
                   WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2) knn
             JOIN article_vectors v ON v.handle = knn.handle
             ORDER BY knn.distance",
        )?;
        let rows = stmt
            .query_map(params![embedding_to_bytes(vector), k as i64], |row| {
                Ok(Neighbor {
                    article_id: row.get(0)?,
                    score: l2_to_cosine(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl SimilarityIndex for VecIndex {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text)
    }

    fn index(&self, article_id: i64, vector: &[f32], metadata: &VectorMetadata) -> Result<String> {
        anyhow::ensure!(
            vector.len() == self.embedder.dimensions(),
            "vector has {} dimensions, index expects {}",
            vector.len(),
            self.embedder.dimensions()
        );

        let handle = uuid::Uuid::now_v7().to_string();
        let mut conn = db::lock(&self.db)?;
        let tx = conn.transaction()?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT handle FROM article_vectors WHERE article_id = ?1",
                [article_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(ref old) = previous {
            tx.execute("DELETE FROM articles_vec WHERE handle = ?1", [old])?;
            tx.execute("DELETE FROM article_vectors WHERE handle = ?1", [old])?;
        }

        tx.execute(
            "INSERT INTO articles_vec (handle, embedding) VALUES (?1, ?2)",
            params![handle, embedding_to_bytes(vector)],
        )?;
        tx.execute(
            "INSERT INTO article_vectors (handle, article_id, title, source_domain, published_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                handle,
                article_id,
                metadata.title,
                metadata.source_domain,
                metadata.published_at.as_ref().map(to_db_time),
                to_db_time(&Utc::now()),
            ],
        )
        .context("failed to record vector metadata")?;
        tx.commit()?;

        tracing::debug!(article_id, handle = %handle, replaced = previous.is_some(), "vector indexed");
        Ok(handle)
    }

    fn nearest(&self, query: &SimilarityQuery, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let conn = db::lock(&self.db)?;
        match query {
            SimilarityQuery::Vector(v) => Self::knn(&conn, v, k),
            SimilarityQuery::Article(article_id) => {
                let blob: Option<Vec<u8>> = conn
                    .query_row(
                        "SELECT e.embedding FROM articles_vec e
                         JOIN article_vectors v ON v.handle = e.handle
                         WHERE v.article_id = ?1",
                        [article_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(blob) = blob else {
                    return Ok(vec![]);
                };
                let mut hits = Self::knn(&conn, &bytes_to_embedding(&blob), k + 1)?;
                hits.retain(|n| n.article_id != *article_id);
                hits.truncate(k);
                Ok(hits)
            }
        }
    }

    fn remove(&self, handle: &str) -> Result<()> {
        let mut conn = db::lock(&self.db)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM articles_vec WHERE handle = ?1", [handle])?;
        tx.execute("DELETE FROM article_vectors WHERE handle = ?1", [handle])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles::store::insert_article;
    use crate::articles::types::NewArticle;
    use crate::embedding::EMBEDDING_DIM;

    struct SpikeEmbedder;

    impl EmbeddingProvider for SpikeEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; EMBEDDING_DIM];
            v[text.len() % EMBEDDING_DIM] = 1.0;
            Ok(v)
        }
    }

    fn spike(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    fn setup(n: usize) -> (VecIndex, Vec<i64>) {
        let conn = db::open_memory_database().unwrap();
        let ids = (0..n)
            .map(|i| {
                insert_article(
                    &conn,
                    &NewArticle {
                        url: format!("https://a.example/{i}"),
                        title: format!("t{i}"),
                        content: None,
                        summary: None,
                        author: None,
                        source_domain: "a.example".into(),
                        published_at: None,
                        fetched_at: Utc::now(),
                    },
                )
                .unwrap()
                .unwrap()
            })
            .collect();
        (VecIndex::new(db::shared(conn), Arc::new(SpikeEmbedder)), ids)
    }

    fn meta() -> VectorMetadata {
        VectorMetadata {
            title: "t".into(),
            source_domain: "a.example".into(),
            published_at: None,
        }
    }

    #[test]
    fn nearest_by_article_excludes_self() {
        let (index, ids) = setup(3);
        index.index(ids[0], &spike(0), &meta()).unwrap();
        index.index(ids[1], &spike(0), &meta()).unwrap();
        index.index(ids[2], &spike(5), &meta()).unwrap();

        let hits = index.nearest(&SimilarityQuery::Article(ids[0]), 3).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].article_id, ids[1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score.abs() < 1e-6);
    }

    #[test]
    fn reindex_replaces_previous_entry() {
        let (index, ids) = setup(1);
        let first = index.index(ids[0], &spike(1), &meta()).unwrap();
        let second = index.index(ids[0], &spike(2), &meta()).unwrap();
        assert_ne!(first, second);

        let hits = index.nearest(&SimilarityQuery::Vector(spike(2)), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remove_and_unknown_article() {
        let (index, ids) = setup(1);
        let handle = index.index(ids[0], &spike(3), &meta()).unwrap();
        index.remove(&handle).unwrap();
        index.remove("no-such-handle").unwrap();
        assert!(index
            .nearest(&SimilarityQuery::Vector(spike(3)), 5)
            .unwrap()
            .is_empty());
        assert!(index
            .nearest(&SimilarityQuery::Article(999), 5)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let (index, ids) = setup(1);
        assert!(index.index(ids[0], &[1.0, 0.0], &meta()).is_err());
    }
}
