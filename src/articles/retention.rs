//! Age-based eviction of articles and their similarity entries.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::to_db_time;

/// Delete every article older than `now - horizon`. See [`evict_before`].
pub fn evict_older_than(conn: &mut Connection, horizon: Duration) -> Result<usize> {
    let cutoff = Utc::now()
        .checked_sub_signed(horizon)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    evict_before(conn, cutoff)
}

/// Delete every article whose published timestamp precedes `cutoff`, together
/// with its similarity entry.
///
/// Undated articles are included: they age by their fetch timestamp, so an
/// article whose feed never supplied a date is still removed once it was
/// fetched before `cutoff`.
///
/// Returns the number of articles removed; a second call with the same cutoff
/// removes nothing.
pub fn evict_before(conn: &mut Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    let cutoff = to_db_time(&cutoff);
    let tx = conn.transaction()?;

    // vec0 has no foreign keys; clear vectors before their owners disappear.
    tx.execute(
        "DELETE FROM articles_vec WHERE handle IN (
             SELECT v.handle FROM article_vectors v
             JOIN articles a ON a.id = v.article_id
             WHERE COALESCE(a.published_at, a.fetched_at) < ?1
         )",
        [&cutoff],
    )?;
    let removed = tx.execute(
        "DELETE FROM articles WHERE COALESCE(published_at, fetched_at) < ?1",
        [&cutoff],
    )?;
    tx.commit()?;

    tracing::info!(removed, cutoff = %cutoff, "retention pass complete");
    Ok(removed)
}
