mod helpers;

use feedmesh::db;
use feedmesh::db::migrations::{get_embedding_model, get_schema_version, set_embedding_model, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

#[test]
fn in_memory_db_is_current() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("all-MiniLM-L6-v2"));
}

#[test]
fn opening_a_v1_file_upgrades_it_in_place() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("old.db");
    {
        db::load_sqlite_vec();
        let conn = rusqlite::Connection::open(&path).unwrap();
        db::schema::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO articles (url, title, source_domain, fetched_at)
             VALUES ('https://a.com/1', 'kept', 'a.com', '2026-01-01T00:00:00.000Z')",
            [],
        )
        .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let title: String = conn
        .query_row("SELECT title FROM articles", [], |r| r.get(0))
        .unwrap();
    assert_eq!(title, "kept");
}

#[test]
fn recorded_model_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("feedmesh.db");
    {
        let conn = db::open_database(&path).unwrap();
        set_embedding_model(&conn, "bge-small-en").unwrap();
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("bge-small-en"));
    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.embedding_model.as_deref(), Some("bge-small-en"));
}
