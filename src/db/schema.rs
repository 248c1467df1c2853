//! SQL DDL for all feedmesh tables.
//!
//! Defines `feeds`, `articles`, `article_vectors` (index metadata),
//! `articles_vec` (vec0) and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Registered syndication feeds
CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    description TEXT,
    category TEXT NOT NULL DEFAULT 'general',
    is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
    last_fetched TEXT,
    fetch_interval_secs INTEGER NOT NULL DEFAULT 1800,
    created_at TEXT NOT NULL
);

-- Ingested articles; the URL is the identity
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content TEXT,
    summary TEXT,
    author TEXT,
    source_domain TEXT NOT NULL,
    published_at TEXT,
    fetched_at TEXT NOT NULL,
    is_processed INTEGER NOT NULL DEFAULT 0 CHECK(is_processed IN (0, 1)),
    embedding_handle TEXT,
    entities TEXT,
    sentiment REAL CHECK(sentiment IS NULL OR (sentiment >= -1.0 AND sentiment <= 1.0))
);

CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at);
CREATE INDEX IF NOT EXISTS idx_articles_processed ON articles(is_processed);
CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source_domain);

-- Metadata stored alongside each indexed vector
CREATE TABLE IF NOT EXISTS article_vectors (
    handle TEXT PRIMARY KEY,
    article_id INTEGER NOT NULL UNIQUE REFERENCES articles(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    source_domain TEXT,
    published_at TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS articles_vec USING vec0(
    handle TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VEC_TABLE_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in ["feeds", "articles", "article_vectors", "articles_vec", "schema_meta"] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }

        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn article_url_is_unique() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let insert = "INSERT INTO articles (url, title, source_domain, fetched_at) \
                      VALUES ('https://a.example/1', 't', 'a.example', '2026-01-01T00:00:00.000Z')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
