mod helpers;

use std::sync::Arc;

use feedmesh::analysis::{search_articles, similar_articles};
use feedmesh::articles::{store, ArticleQuery};
use feedmesh::db::{self, SharedDb};
use feedmesh::embedding::EmbeddingProvider;
use feedmesh::similarity::{SimilarityIndex, UnavailableIndex, VecIndex, VectorMetadata};

use helpers::{
    hours_ago, insert_processed, similar_embedding, table_embedder, test_db, test_embedding,
    TableEmbedder,
};

fn index_vector(db: &SharedDb, index: &VecIndex, id: i64, vector: Vec<f32>) {
    let meta = VectorMetadata {
        title: format!("article {id}"),
        source_domain: "example".into(),
        published_at: None,
    };
    let handle = index.index(id, &vector, &meta).unwrap();
    let conn = db::lock(db).unwrap();
    store::set_embedding_handle(&conn, id, &handle).unwrap();
}

/// a and b are near-duplicates, c is unrelated, d has no vector.
fn fixture() -> (SharedDb, Arc<TableEmbedder>, VecIndex, [i64; 4]) {
    let conn = test_db();
    let a = insert_processed(&conn, "https://a.com/1", "a.com", hours_ago(4), &[], 0.0);
    let b = insert_processed(&conn, "https://b.com/1", "b.com", hours_ago(3), &[], 0.0);
    let c = insert_processed(&conn, "https://c.com/1", "c.com", hours_ago(2), &[], 0.0);
    let d = insert_processed(&conn, "https://a.com/2", "a.com", hours_ago(1), &[], 0.0);

    let db = db::shared(conn);
    let embedder = table_embedder();
    let index = VecIndex::new(db.clone(), embedder.clone() as Arc<dyn EmbeddingProvider>);
    let base = test_embedding(3);
    index_vector(&db, &index, a, base.clone());
    index_vector(&db, &index, b, similar_embedding(&base));
    index_vector(&db, &index, c, test_embedding(200));
    (db, embedder, index, [a, b, c, d])
}

#[test]
fn similar_articles_rank_the_near_duplicate_first() {
    let (db, _, index, [a, b, _, _]) = fixture();

    let similar = similar_articles(&db, &index, a, 2).unwrap().unwrap();

    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].article_id, b);
    assert_eq!(similar[0].source_domain, "b.com");
    assert_eq!(similar[0].url, "https://b.com/1");
    assert!(similar[0].score >= 0.95);
    assert!(similar[1].score < 0.5);
    assert!(similar.iter().all(|r| r.article_id != a));
}

#[test]
fn similar_articles_for_unknown_or_unindexed_articles() {
    let (db, _, index, [_, _, _, unindexed]) = fixture();

    assert!(similar_articles(&db, &index, 9999, 5).unwrap().is_none());
    assert_eq!(similar_articles(&db, &index, unindexed, 5).unwrap(), Some(vec![]));
}

#[test]
fn search_embeds_the_query_text() {
    let (db, embedder, index, [a, b, _, _]) = fixture();
    embedder.set("acme plant", test_embedding(3));

    let results = search_articles(&db, &index, "  acme plant expansion ", 2).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].article_id, a);
    assert!((results[0].score - 1.0).abs() < 1e-3);
    assert_eq!(results[1].article_id, b);
}

#[test]
fn blank_search_matches_nothing() {
    let (db, _, _, _) = fixture();
    let offline = UnavailableIndex::new("offline");

    assert!(search_articles(&db, &offline, "   ", 5).unwrap().is_empty());
    assert!(search_articles(&db, &offline, "acme", 5).is_err());
}

#[test]
fn evicted_hits_are_skipped() {
    let (db, _, index, [a, b, _, _]) = fixture();
    {
        // Leave b's vector behind, as a concurrent eviction could.
        let conn = db::lock(&db).unwrap();
        conn.execute_batch("PRAGMA foreign_keys = OFF").unwrap();
        conn.execute("DELETE FROM articles WHERE id = ?1", [b]).unwrap();
    }

    let similar = similar_articles(&db, &index, a, 3).unwrap().unwrap();
    assert!(similar.iter().all(|r| r.article_id != b));
}

#[test]
fn listing_filters_by_source_and_pages() {
    let (db, _, _, [a, _, _, d]) = fixture();
    let conn = db::lock(&db).unwrap();

    let from_a = store::query_articles(
        &conn,
        &ArticleQuery {
            source_domain: Some("a.com".into()),
            newest_first: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(from_a.iter().map(|x| x.id).collect::<Vec<_>>(), vec![d, a]);

    let second_page = store::query_articles(
        &conn,
        &ArticleQuery {
            newest_first: true,
            limit: Some(2),
            offset: Some(2),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[1].id, a);

    let skipped_only = store::query_articles(
        &conn,
        &ArticleQuery {
            offset: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(skipped_only.len(), 1);
}
