//! CLI handlers for `zoneatlas cache` subcommands.

use anyhow::Result;
use chrono::Utc;

use crate::cache::{CacheStore, FileCacheStore};
use crate::cli::output;
use crate::config::RuntimeConfig;

/// Show cached documents and their freshness.
pub async fn run_status(config: &RuntimeConfig) -> Result<()> {
    let cache = FileCacheStore::new(config.cache_dir.clone())?;
    let entries = cache.entries()?;
    let now = Utc::now();

    if output::is_json() {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|(key, doc)| {
                serde_json::json!({
                    "key": key,
                    "jurisdiction": doc.jurisdiction_id,
                    "source_url": doc.source_url,
                    "fetched_at": doc.fetched_at.to_rfc3339(),
                    "fresh": doc.is_fresh(config.cache_ttl, now),
                    "bytes": doc.payload.len(),
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "cache_dir": config.cache_dir,
            "entries": items,
        }));
        return Ok(());
    }

    if entries.is_empty() {
        if !output::is_quiet() {
            println!("  Cache is empty ({}).", config.cache_dir.display());
        }
        return Ok(());
    }

    println!("  Cached documents in {}:\n", config.cache_dir.display());
    for (_, doc) in &entries {
        let state = if doc.is_fresh(config.cache_ttl, now) { "fresh" } else { "stale" };
        println!(
            "    {:<24}  {:<5}  {:>8} KB  {}",
            doc.jurisdiction_id,
            state,
            doc.payload.len() / 1024,
            doc.fetched_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Clear cached documents (all, or one jurisdiction's).
pub async fn run_clear(config: &RuntimeConfig, jurisdiction: Option<&str>) -> Result<()> {
    let cache = FileCacheStore::new(config.cache_dir.clone())?;
    let mut removed = 0usize;
    for (key, doc) in cache.entries()? {
        if jurisdiction.is_some_and(|id| id != doc.jurisdiction_id) {
            continue;
        }
        if cache.remove(&key)? {
            removed += 1;
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({ "removed": removed }));
    } else if !output::is_quiet() {
        println!("  Removed {removed} cached documents.");
    }
    Ok(())
}
