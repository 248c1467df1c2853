//! One-shot analysis queries printed to the terminal.

use anyhow::Result;

use feedmesh::analysis::{self, GraphNode, RelatedArticle};
use feedmesh::articles::store;
use feedmesh::config::FeedmeshConfig;
use feedmesh::db;
use feedmesh::server::{self, clamp_days, clamp_hours, clamp_limit, clamp_similarity, ListParams};

pub fn cascades(config: &FeedmeshConfig, hours: i64, limit: usize, json: bool) -> Result<()> {
    let hours = clamp_hours(hours);
    let conn = db::open_database(config.resolved_db_path())?;
    let mut cascades = analysis::detect_cascades(&conn, hours)?;
    let detected = cascades.len();
    cascades.truncate(limit);
    if json {
        return super::print_json(&cascades);
    }

    println!("Cascades in the last {hours}h: {detected} detected");
    println!("{}", "=".repeat(60));
    for c in &cascades {
        println!(
            "{:<30} {:<8} sources={:<3} mentions={:<3} velocity={:.2}/h",
            c.entity, c.entity_type, c.source_count, c.mention_count, c.velocity
        );
        println!("    {}", c.sources.join(", "));
    }
    Ok(())
}

pub fn trending(config: &FeedmeshConfig, hours: i64, json: bool) -> Result<()> {
    let hours = clamp_hours(hours);
    let conn = db::open_database(config.resolved_db_path())?;
    let topics = analysis::trending_topics(&conn, hours, config.analysis.trending_limit)?;
    if json {
        return super::print_json(&topics);
    }

    println!("Trending in the last {hours}h");
    for (rank, t) in topics.iter().enumerate() {
        println!("{:>3}. {:<32} {:<8} {}", rank + 1, t.entity, t.entity_type, t.count);
    }
    Ok(())
}

pub fn timeline(config: &FeedmeshConfig, entity: &str, days: i64, json: bool) -> Result<()> {
    let days = clamp_days(days);
    let conn = db::open_database(config.resolved_db_path())?;
    let entries = analysis::entity_timeline(&conn, entity, days)?;
    if json {
        return super::print_json(&entries);
    }

    println!("\"{entity}\" over the last {days} days: {} articles", entries.len());
    for e in &entries {
        println!(
            "  {}  {:<24} {}",
            e.published_at.format("%Y-%m-%d %H:%M"),
            e.source_domain,
            e.title
        );
    }
    Ok(())
}

pub fn sources(config: &FeedmeshConfig, json: bool) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    let stats = analysis::source_statistics(&conn)?;
    if json {
        return super::print_json(&stats);
    }

    println!("{:<36} {:>8} {:>10}", "SOURCE", "ARTICLES", "SENTIMENT");
    for s in &stats {
        println!("{:<36} {:>8} {:>10.3}", s.source_domain, s.article_count, s.avg_sentiment);
    }
    Ok(())
}

pub fn graph(config: FeedmeshConfig, hours: i64, min_similarity: f64, json: bool) -> Result<()> {
    let hours = clamp_hours(hours);
    let min_similarity = clamp_similarity(min_similarity);
    let services = server::setup(config)?;
    let graph = analysis::build_graph(
        &services.db,
        services.similarity.as_ref(),
        hours,
        min_similarity,
        &services.config.analysis,
    )?;
    if json {
        return super::print_json(&graph);
    }

    println!(
        "Graph over {hours}h (min similarity {min_similarity:.2}): {} articles, {} entities, {} links",
        graph.stats.article_count, graph.stats.entity_count, graph.stats.connection_count
    );
    for node in &graph.nodes {
        if let GraphNode::Entity {
            label,
            entity_type,
            mention_count,
            ..
        } = node
        {
            println!("  {label:<32} {entity_type:<8} {mention_count} articles");
        }
    }
    Ok(())
}

pub fn articles(config: &FeedmeshConfig, params: ListParams, json: bool) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    let articles = store::query_articles(&conn, &params.to_query())?;
    if json {
        return super::print_json(&articles);
    }

    for a in &articles {
        let published = a
            .published_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".into());
        println!("{:>6}  {published:<16}  {:<24} {}", a.id, a.source_domain, a.title);
    }
    println!("{} articles", articles.len());
    Ok(())
}

fn print_related(related: &[RelatedArticle]) {
    for r in related {
        println!("  {:.3}  {:>6}  {:<24} {}", r.score, r.article_id, r.source_domain, r.title);
    }
}

pub fn similar(config: FeedmeshConfig, id: i64, limit: usize, json: bool) -> Result<()> {
    let services = server::setup(config)?;
    let Some(similar) =
        analysis::similar_articles(&services.db, services.similarity.as_ref(), id, clamp_limit(limit))?
    else {
        anyhow::bail!("article {id} not found");
    };
    if json {
        return super::print_json(&similar);
    }

    println!("Articles similar to {id}:");
    print_related(&similar);
    Ok(())
}

pub fn search(config: FeedmeshConfig, query: &str, limit: usize, json: bool) -> Result<()> {
    anyhow::ensure!(!query.trim().is_empty(), "search query must not be empty");
    let services = server::setup(config)?;
    let results =
        analysis::search_articles(&services.db, services.similarity.as_ref(), query, clamp_limit(limit))?;
    if json {
        return super::print_json(&results);
    }

    println!("\"{query}\": {} matches", results.len());
    print_related(&results);
    Ok(())
}
