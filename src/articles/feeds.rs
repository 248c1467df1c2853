//! Feed registry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::types::Feed;
use crate::config::FeedSeed;
use crate::db::{parse_db_time, to_db_time};

const FEED_COLUMNS: &str =
    "id, url, title, description, category, is_active, last_fetched, fetch_interval_secs, created_at";

/// Default refetch interval for newly registered feeds.
pub const DEFAULT_FETCH_INTERVAL_SECS: i64 = 1800;

#[derive(Debug, Serialize)]
pub struct RegisterFeedResult {
    pub id: i64,
    /// `true` when the URL was already registered and nothing changed.
    pub existing: bool,
}

fn row_to_feed(row: &Row<'_>) -> rusqlite::Result<Feed> {
    let last_fetched: Option<String> = row.get(6)?;
    let created: String = row.get(8)?;
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        last_fetched: last_fetched.as_deref().and_then(parse_db_time),
        fetch_interval_secs: row.get(7)?,
        created_at: parse_db_time(&created).unwrap_or_default(),
    })
}

/// Register a feed. A URL that is already registered returns the existing row.
pub fn register_feed(conn: &Connection, seed: &FeedSeed) -> Result<RegisterFeedResult> {
    if let Some(id) = conn
        .query_row("SELECT id FROM feeds WHERE url = ?1", [&seed.url], |row| row.get(0))
        .optional()?
    {
        return Ok(RegisterFeedResult { id, existing: true });
    }

    conn.execute(
        "INSERT INTO feeds (url, title, description, category, fetch_interval_secs, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            seed.url,
            seed.title,
            seed.description,
            seed.category,
            DEFAULT_FETCH_INTERVAL_SECS,
            to_db_time(&Utc::now()),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(feed_id = id, url = %seed.url, "feed registered");
    Ok(RegisterFeedResult { id, existing: false })
}

pub fn list_feeds(conn: &Connection) -> Result<Vec<Feed>> {
    let sql = format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let feeds = stmt
        .query_map([], row_to_feed)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(feeds)
}

pub fn active_feeds(conn: &Connection) -> Result<Vec<Feed>> {
    Ok(list_feeds(conn)?.into_iter().filter(|f| f.is_active).collect())
}

/// Active feeds whose fetch interval has elapsed at `now`.
pub fn due_feeds(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Feed>> {
    Ok(active_feeds(conn)?
        .into_iter()
        .filter(|f| f.is_due(now))
        .collect())
}

pub fn mark_fetched(conn: &Connection, feed_id: i64, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE feeds SET last_fetched = ?1 WHERE id = ?2",
        params![to_db_time(&at), feed_id],
    )?;
    Ok(())
}

/// Enable or disable a feed by URL. Returns `false` if no such feed exists.
pub fn set_active(conn: &Connection, url: &str, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE feeds SET is_active = ?1 WHERE url = ?2",
        params![active as i64, url],
    )?;
    Ok(changed == 1)
}

/// Register the seed list, but only when no feed has ever been registered.
pub fn seed_feeds(conn: &Connection, seeds: &[FeedSeed]) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM feeds", [], |row| row.get(0))?;
    if existing > 0 {
        tracing::debug!(existing, "feeds already present, skipping seed");
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut added = 0;
    for seed in seeds {
        if !register_feed(&tx, seed)?.existing {
            added += 1;
        }
    }
    tx.commit()?;
    tracing::info!(added, "seeded default feeds");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn seed(url: &str) -> FeedSeed {
        FeedSeed {
            url: url.into(),
            title: "Example".into(),
            description: None,
            category: "general".into(),
        }
    }

    #[test]
    fn register_is_idempotent_per_url() {
        let conn = open_memory_database().unwrap();
        let first = register_feed(&conn, &seed("https://a.example/rss")).unwrap();
        let second = register_feed(&conn, &seed("https://a.example/rss")).unwrap();
        assert!(!first.existing);
        assert!(second.existing);
        assert_eq!(first.id, second.id);
        assert_eq!(list_feeds(&conn).unwrap().len(), 1);
    }

    #[test]
    fn seeding_only_touches_empty_table() {
        let conn = open_memory_database().unwrap();
        let seeds = crate::config::default_feeds();
        assert_eq!(seed_feeds(&conn, &seeds).unwrap(), seeds.len());
        assert_eq!(seed_feeds(&conn, &seeds).unwrap(), 0);
        assert_eq!(list_feeds(&conn).unwrap().len(), seeds.len());
    }

    #[test]
    fn disabled_and_recent_feeds_are_not_due() {
        let conn = open_memory_database().unwrap();
        let a = register_feed(&conn, &seed("https://a.example/rss")).unwrap();
        register_feed(&conn, &seed("https://b.example/rss")).unwrap();
        register_feed(&conn, &seed("https://c.example/rss")).unwrap();

        let now = Utc::now();
        mark_fetched(&conn, a.id, now).unwrap();
        assert!(set_active(&conn, "https://b.example/rss", false).unwrap());
        assert!(!set_active(&conn, "https://missing.example/rss", false).unwrap());

        let due = due_feeds(&conn, now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].url, "https://c.example/rss");
        assert_eq!(due[0].fetch_interval_secs, DEFAULT_FETCH_INTERVAL_SECS);
    }
}
