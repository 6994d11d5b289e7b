//! CLI subcommand implementations for the `zoneatlas` binary.

pub mod acquire_cmd;
pub mod cache_cmd;
pub mod doctor;
pub mod extract_cmd;
pub mod output;
pub mod registry_cmd;
pub mod zone_cmd;

use anyhow::Result;
use std::sync::Arc;

use crate::acquisition::http_client::HttpProvider;
use crate::acquisition::render_service::RenderServiceProvider;
use crate::acquisition::ProviderSet;
use crate::cache::FileCacheStore;
use crate::config::RuntimeConfig;
use crate::renderer::BrowserProvider;
use crate::resolver::{ResolverSettings, SourceResolver};

/// Default timeout for the plain HTTP client; rungs override it per request.
const HTTP_DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Every provider the configuration allows.
///
/// HTTP and the browser are always present (Chromium launches lazily); the
/// render service needs both an endpoint and a key.
pub fn build_providers(config: &RuntimeConfig) -> Result<ProviderSet> {
    let mut providers = ProviderSet::new()
        .with(Arc::new(HttpProvider::new(HTTP_DEFAULT_TIMEOUT_MS)))
        .with(Arc::new(BrowserProvider::new(config.chromium_path.clone())));

    match (&config.render_endpoint, &config.render_key) {
        (Some(endpoint), Some(key)) => {
            providers = providers.with(Arc::new(RenderServiceProvider::new(endpoint, key)?));
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("render service needs both ZONEATLAS_RENDER_ENDPOINT and ZONEATLAS_RENDER_KEY; disabled");
        }
        (None, None) => {}
    }
    Ok(providers)
}

/// Resolver over the on-disk cache.
pub fn build_resolver(config: &RuntimeConfig) -> Result<SourceResolver> {
    let cache = FileCacheStore::new(config.cache_dir.clone())?;
    Ok(SourceResolver::new(
        build_providers(config)?,
        Arc::new(cache),
        ResolverSettings::from(config),
    ))
}
