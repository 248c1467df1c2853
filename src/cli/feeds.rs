//! `feedmesh feeds` subcommands.

use anyhow::Result;

use feedmesh::articles::feeds;
use feedmesh::config::{FeedSeed, FeedmeshConfig};
use feedmesh::db;

pub fn add(config: &FeedmeshConfig, seed: FeedSeed) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    let result = feeds::register_feed(&conn, &seed)?;
    if result.existing {
        println!("Feed already registered (id {}): {}", result.id, seed.url);
    } else {
        println!("Registered feed {}: {}", result.id, seed.url);
    }
    Ok(())
}

pub fn list(config: &FeedmeshConfig, json: bool) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    let feeds = feeds::list_feeds(&conn)?;
    if json {
        return super::print_json(&feeds);
    }

    if feeds.is_empty() {
        println!("No feeds registered. Add one with `feedmesh feeds add <url>`.");
        return Ok(());
    }
    println!("{:<4} {:<7} {:<12} {:<22} URL", "ID", "ACTIVE", "CATEGORY", "LAST FETCHED");
    for feed in &feeds {
        let last = feed
            .last_fetched
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "{:<4} {:<7} {:<12} {:<22} {}",
            feed.id,
            if feed.is_active { "yes" } else { "no" },
            feed.category,
            last,
            feed.url
        );
    }
    Ok(())
}

pub fn set_active(config: &FeedmeshConfig, url: &str, active: bool) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    if !feeds::set_active(&conn, url, active)? {
        anyhow::bail!("no feed registered with url {url}");
    }
    println!("{} {url}", if active { "Enabled" } else { "Disabled" });
    Ok(())
}
