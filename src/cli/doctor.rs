//! `feedmesh doctor`: database and pipeline diagnostics.

use anyhow::{Context, Result};
use chrono::Utc;

use feedmesh::articles::{feeds, stats};
use feedmesh::config::FeedmeshConfig;
use feedmesh::db;

fn check(ok: bool, label: &str, detail: impl std::fmt::Display) {
    let mark = if ok { "ok  " } else { "WARN" };
    println!("[{mark}] {label:<22} {detail}");
}

pub fn doctor(config: &FeedmeshConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("No database at {}.", db_path.display());
        println!("`feedmesh fetch` or `feedmesh serve` creates it.");
        return Ok(());
    }

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let health = db::check_database_health(&conn).context("failed to run health check")?;
    let counts = stats::article_stats(&conn, Some(db_path.as_path()))?;
    let registered = feeds::list_feeds(&conn)?;

    println!("{} ({:.1} MB)", db_path.display(), counts.db_size_bytes as f64 / 1_048_576.0);
    println!(
        "schema v{}, sqlite-vec {}",
        health.schema_version, health.sqlite_vec_version
    );
    println!();

    check(
        health.integrity_ok,
        "integrity",
        if health.integrity_ok { "passed" } else { health.integrity_details.as_str() },
    );

    let stored_model = health.embedding_model.as_deref().unwrap_or("(not set)");
    check(
        stored_model == config.embedding.model,
        "embedding model",
        format!("stored {stored_model}, configured {}", config.embedding.model),
    );

    let model_dir = feedmesh::config::expand_tilde(&config.embedding.cache_dir);
    let model_present = model_dir.join("model.onnx").exists() && model_dir.join("tokenizer.json").exists();
    check(
        model_present,
        "model files",
        if model_present {
            model_dir.display().to_string()
        } else {
            "missing, run `feedmesh model download`".to_string()
        },
    );

    check(
        counts.unprocessed_articles == 0,
        "annotation backlog",
        format!("{} of {} articles unprocessed", counts.unprocessed_articles, counts.total_articles),
    );
    let unindexed = counts.processed_articles.saturating_sub(counts.indexed_articles);
    check(
        unindexed == 0,
        "similarity index",
        format!("{} vectors, {unindexed} processed articles without one", health.vector_count),
    );

    let active: Vec<_> = registered.iter().filter(|f| f.is_active).collect();
    let never = active.iter().filter(|f| f.last_fetched.is_none()).count();
    let due = active.iter().filter(|f| f.is_due(Utc::now())).count();
    check(
        !active.is_empty(),
        "feeds",
        format!("{} active of {}, {due} due, {never} never fetched", active.len(), registered.len()),
    );

    if !health.integrity_ok {
        println!();
        println!("Articles are re-fetched from their feeds: moving the damaged file aside");
        println!("and running `feedmesh fetch` rebuilds a fresh store.");
    }
    Ok(())
}
