//! `zoneatlas zone`: assign a district to every parcel in a layer.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::batch::{summarize, zone_parcels};
use crate::cli::output;
use crate::config::RuntimeConfig;
use crate::store::StandardsStore;
use zoneatlas::spatial::parcels_from_geojson;
use zoneatlas::PolygonIndex;

/// Layer and output options for a zoning run.
pub struct ZoneArgs<'a> {
    pub jurisdiction: &'a str,
    pub parcels: &'a Path,
    pub zoning: &'a Path,
    pub id_property: &'a str,
    pub use_code_property: Option<&'a str>,
    pub zone_property: &'a str,
    pub buffer_ft: f64,
    pub out: Option<&'a Path>,
    pub no_store: bool,
}

pub async fn run(config: &RuntimeConfig, args: ZoneArgs<'_>) -> Result<()> {
    let registry = config.load_registry()?;
    let authority = registry.authority_of(args.jurisdiction)?;

    let zoning = std::fs::read_to_string(args.zoning)
        .with_context(|| format!("failed to read zoning layer: {}", args.zoning.display()))?;
    let index = PolygonIndex::from_geojson(&zoning, args.zone_property)
        .with_context(|| format!("invalid zoning layer: {}", args.zoning.display()))?;

    let parcels_raw = std::fs::read_to_string(args.parcels)
        .with_context(|| format!("failed to read parcel layer: {}", args.parcels.display()))?;
    let parcels = parcels_from_geojson(&parcels_raw, args.id_property, args.use_code_property)
        .with_context(|| format!("invalid parcel layer: {}", args.parcels.display()))?;

    tracing::info!(
        jurisdiction = %authority.id,
        parcels = parcels.len(),
        zoning_polygons = index.len(),
        "zoning parcels"
    );
    let start = Instant::now();
    let assignments = zone_parcels(&index, &parcels, authority, args.buffer_ft);
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let summary = summarize(&assignments);

    if !args.no_store {
        let mut store = StandardsStore::open(&config.db_path)?;
        store.record_assignments(&assignments)?;
    }

    if let Some(out) = args.out {
        let mut file = std::fs::File::create(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
        for a in &assignments {
            writeln!(file, "{}", serde_json::to_string(a)?)?;
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "jurisdiction": authority.id,
            "elapsed_ms": elapsed_ms,
            "summary": summary,
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    println!(
        "  Zoned {} parcels against {} in {elapsed_ms}ms\n",
        summary.total, authority.name
    );
    println!("    by confidence:");
    for (tier, n) in &summary.by_confidence {
        println!("      {tier:<8} {n}");
    }
    println!("    by method:");
    for (method, n) in &summary.by_method {
        println!("      {method:<18} {n}");
    }
    Ok(())
}
