//! Environment readiness check.

use anyhow::Result;

use crate::cli::output;
use crate::config::RuntimeConfig;
use crate::renderer::chromium::find_chromium;
use crate::store::StandardsStore;

/// Check the registry, cache, store and every acquisition provider.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    let registry = config.load_registry();
    let chromium = find_chromium(config.chromium_path.clone());
    let render_service = config.render_endpoint.is_some() && config.render_key.is_some();
    let cache_ok = std::fs::create_dir_all(&config.cache_dir).is_ok();
    let store_ok = StandardsStore::open(&config.db_path).is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "jurisdictions": registry.as_ref().ok().map(|r| r.len()),
            "registry_error": registry.as_ref().err().map(|e| format!("{e:#}")),
            "chromium": chromium,
            "render_service": render_service,
            "cache_dir": config.cache_dir,
            "cache_writable": cache_ok,
            "db_path": config.db_path,
            "store_ok": store_ok,
        }));
        return Ok(());
    }

    let s = output::Styled::new();
    println!("ZoneAtlas Doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &registry {
        Ok(r) => println!("{} Registry: {} jurisdictions", s.ok_sym(), r.len()),
        Err(e) => println!("{} Registry invalid: {e:#}", s.fail_sym()),
    }
    match &chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found; browser rungs will fail. Set ZONEATLAS_CHROMIUM_PATH.",
            s.warn_sym()
        ),
    }
    if render_service {
        println!("{} Render service configured", s.ok_sym());
    } else {
        println!(
            "{} Render service not configured (ZONEATLAS_RENDER_ENDPOINT, ZONEATLAS_RENDER_KEY)",
            s.warn_sym()
        );
    }
    let sym = |ok: bool| if ok { s.ok_sym() } else { s.fail_sym() };
    println!("{} Cache dir: {}", sym(cache_ok), config.cache_dir.display());
    println!("{} Store: {}", sym(store_ok), config.db_path.display());

    println!();
    if registry.is_ok() && cache_ok && store_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
