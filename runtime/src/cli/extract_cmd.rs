//! `zoneatlas extract <jurisdiction>`: canonicalize a source into standards.

use anyhow::{Context, Result};

use crate::audit::ReviewQueue;
use crate::batch::extract_document;
use crate::cli::{build_resolver, output};
use crate::config::RuntimeConfig;
use crate::store::StandardsStore;

/// Acquire (cache first) and extract standards for one jurisdiction.
pub async fn run(config: &RuntimeConfig, id: &str, force: bool, no_store: bool) -> Result<()> {
    let registry = config.load_registry()?;
    let authority = registry.authority_of(id)?;
    let resolver = build_resolver(config)?;
    let mut review = ReviewQueue::open(&config.review_log)?;

    let doc = match resolver.resolve(authority, force).await {
        Ok(doc) => doc,
        Err(failure) => {
            review.record_failure(&failure)?;
            return Err(failure).context("source acquisition failed");
        }
    };
    review.record_document(&doc)?;

    let extraction = extract_document(&doc, authority);
    review.record_rejects(&extraction.rejected)?;

    if !no_store {
        let mut store = StandardsStore::open(&config.db_path)?;
        store.record_standards(&extraction.standards)?;
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "jurisdiction": authority.id,
            "requested": id,
            "stale": doc.is_stale(),
            "standards": extraction.standards,
            "rejected": extraction.rejected.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    println!(
        "  {} districts extracted for {} ({} rejected fragments)\n",
        extraction.standards.len(),
        authority.name,
        extraction.rejected.len()
    );
    println!(
        "    {:<10} {:>10} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "district", "lot sqft", "width", "height", "front", "side", "rear"
    );
    for s in &extraction.standards {
        println!(
            "    {:<10} {:>10} {:>8} {:>8} {:>8} {:>8} {:>8}",
            s.district_code,
            cell(s.min_lot_area_sqft.map(|v| v as f64)),
            cell(s.min_lot_width_ft),
            cell(s.max_height_ft),
            cell(s.front_setback_ft),
            cell(s.side_setback_ft),
            cell(s.rear_setback_ft),
        );
    }
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v}"))
}
