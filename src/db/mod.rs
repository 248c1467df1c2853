//! SQLite database initialization, schema, migrations and health checks.
//!
//! The connection is shared across the scheduler, the annotation workers and
//! the query surface as [`SharedDb`]. Synchronous work against it runs on the
//! blocking pool via [`run_blocking`].

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Once};

/// Connection handle shared between tasks.
pub type SharedDb = Arc<Mutex<Connection>>;

/// How long a writer waits on a locked database before failing.
pub const BUSY_TIMEOUT_MS: u64 = 5000;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the feedmesh database at the given path, with all
/// extensions loaded, schema initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

pub fn shared(conn: Connection) -> SharedDb {
    Arc::new(Mutex::new(conn))
}

/// Lock the shared connection, mapping mutex poisoning into an error.
pub fn lock(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
}

/// Run a synchronous closure against the shared connection on the blocking pool.
pub async fn run_blocking<T, F>(db: &SharedDb, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut conn = lock(&db)?;
        f(&mut conn)
    })
    .await
    .context("db task failed")?
}

/// Format a timestamp for storage. Fixed millisecond precision keeps lexical
/// and chronological order identical.
pub fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Database diagnostics for `feedmesh doctor` and `/health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub article_count: i64,
    pub feed_count: i64,
    pub vector_count: i64,
}

/// Run `PRAGMA integrity_check` and gather basic counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let integrity_ok = integrity_details == "ok";

    let schema_version = migrations::get_schema_version(conn)?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
    let embedding_model = migrations::get_embedding_model(conn)?;

    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

    Ok(HealthReport {
        integrity_ok,
        integrity_details,
        schema_version,
        sqlite_vec_version,
        embedding_model,
        article_count: count("SELECT COUNT(*) FROM articles")?,
        feed_count: count("SELECT COUNT(*) FROM feeds")?,
        vector_count: count("SELECT COUNT(*) FROM article_vectors")?,
    })
}
