use anyhow::Result;

use feedmesh::config::FeedmeshConfig;

/// Display processing statistics in the terminal.
pub fn stats(config: &FeedmeshConfig, json: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = feedmesh::db::open_database(&db_path)?;

    let response = feedmesh::articles::stats::article_stats(&conn, Some(&db_path))?;
    if json {
        return super::print_json(&response);
    }

    println!("Feedmesh Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total articles:      {}", response.total_articles);
    println!("  Processed:           {}", response.processed_articles);
    println!("  Unprocessed:         {}", response.unprocessed_articles);
    println!("  Indexed:             {}", response.indexed_articles);
    println!();
    println!("  Feeds:               {} ({} active)", response.total_feeds, response.active_feeds);
    println!("  Source domains:      {}", response.source_domains);
    println!("  Database size:       {} bytes", response.db_size_bytes);

    if let Some(ref oldest) = response.oldest_article {
        println!("  Oldest article:      {oldest}");
    }
    if let Some(ref newest) = response.newest_article {
        println!("  Newest article:      {newest}");
    }

    Ok(())
}
