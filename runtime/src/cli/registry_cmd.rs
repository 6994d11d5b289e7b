//! CLI handlers for `zoneatlas registry` subcommands.

use anyhow::Result;

use crate::cli::output;
use crate::config::RuntimeConfig;

/// List all jurisdictions.
pub async fn run_list(config: &RuntimeConfig) -> Result<()> {
    let registry = config.load_registry()?;

    if output::is_json() {
        let items: Vec<serde_json::Value> = registry
            .iter()
            .map(|j| {
                serde_json::json!({
                    "id": j.id,
                    "name": j.name,
                    "authority": j.authority,
                    "districts": j.districts.len(),
                    "strategies": j.strategies.len(),
                })
            })
            .collect();
        output::print_json(&serde_json::json!({ "jurisdictions": items }));
        return Ok(());
    }

    println!("  Jurisdictions:\n");
    for j in registry.iter() {
        match &j.authority {
            Some(authority) => println!("    {:<24}  {:<28}  -> {authority}", j.id, j.name),
            None => println!(
                "    {:<24}  {:<28}  {} districts, {} rungs",
                j.id,
                j.name,
                j.districts.len(),
                j.strategies.len()
            ),
        }
    }
    Ok(())
}

/// Show one jurisdiction in full, following delegation.
pub async fn run_show(config: &RuntimeConfig, id: &str) -> Result<()> {
    let registry = config.load_registry()?;
    let jurisdiction = registry.require(id)?;
    let authority = registry.authority_of(id)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "jurisdiction": jurisdiction,
            "authority": authority.id,
        }));
        return Ok(());
    }

    println!("  {} ({})", jurisdiction.name, jurisdiction.id);
    if authority.id != jurisdiction.id {
        println!("    zoning authority: {} ({})", authority.name, authority.id);
    }
    if let Some(url) = &authority.source_url {
        println!("    source:   {url}");
    }
    println!("    ladder:");
    for (i, s) in authority.strategies.iter().enumerate() {
        println!("      {}. {}", i + 1, s.label());
    }
    let codes: Vec<&str> = authority.districts.iter().map(|d| d.code.as_str()).collect();
    println!("    districts: {}", codes.join(", "));
    if let Some(baseline) = &authority.baseline_district {
        println!("    baseline:  {baseline}");
    }
    Ok(())
}
