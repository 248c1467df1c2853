//! Forward-only schema migrations.
//!
//! `schema_meta` holds `schema_version` (and, from v2, `embedding_model`).
//! Each step in [`MIGRATIONS`] runs in its own transaction together with the
//! version bump, so a failed step leaves the previous version intact.

use rusqlite::{Connection, OptionalExtension};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// `(target version, step)`, ascending.
const MIGRATIONS: &[(u32, Step)] = &[(2, add_window_index_and_model)];

fn read_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM schema_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Stored schema version; 0 when missing or unreadable.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(read_meta(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// The model that produced the vectors currently in `articles_vec`, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    read_meta(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    write_meta(conn, "embedding_model", model)
}

/// Apply every step newer than the stored version.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current = get_schema_version(conn)?;
    let pending: Vec<_> = MIGRATIONS.iter().filter(|(to, _)| *to > current).collect();
    if pending.is_empty() {
        tracing::debug!(schema_version = current, "schema up to date");
        return Ok(());
    }

    for (to, step) in pending {
        tracing::info!(to, "applying schema migration");
        let tx = conn.unchecked_transaction()?;
        step(&tx)?;
        write_meta(&tx, "schema_version", &to.to_string())?;
        tx.commit()?;
    }
    Ok(())
}

/// v2: window queries filter on processed state and sort by publish time in
/// one index; the vector model identifier is recorded.
fn add_window_index_and_model(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_articles_processed_published
             ON articles(is_processed, published_at);
         INSERT OR IGNORE INTO schema_meta (key, value)
             VALUES ('embedding_model', 'all-MiniLM-L6-v2');",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn steps_are_ordered_and_end_at_current() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(MIGRATIONS.last().map(|(v, _)| *v), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn upgrade_adds_window_index() {
        let conn = v1_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index'
                 AND name = 'idx_articles_processed_published'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }

    #[test]
    fn unreadable_version_counts_as_zero() {
        let conn = v1_db();
        write_meta(&conn, "schema_version", "garbage").unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn embedding_model_can_be_replaced() {
        let conn = v1_db();
        run_migrations(&conn).unwrap();

        set_embedding_model(&conn, "bge-small-en").unwrap();
        assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("bge-small-en"));
        run_migrations(&conn).unwrap();
        assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("bge-small-en"));
    }
}
