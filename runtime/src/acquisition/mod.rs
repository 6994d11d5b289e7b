//! Acquisition providers: the adapters the source resolver fetches through.
//!
//! Every provider answers the same question (give me the text at this URL,
//! rendered or not, within this timeout) so the resolver can walk a
//! jurisdiction's ladder without knowing which backend sits behind a rung.

pub mod http_client;
pub mod render_service;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use zoneatlas::{ProviderKind, RenderMode};

/// One fetch, as described by a ladder rung (after escalation).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub render: RenderMode,
    /// Extra settle time after load, for client-rendered pages.
    pub wait_ms: u64,
    pub timeout_ms: u64,
}

/// A backend that can fetch a page's text.
#[async_trait]
pub trait AcquisitionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// One-time setup, run before the first fetch and outside any
    /// attempt deadline.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Fetch the page. Transport errors, HTTP error statuses and timeouts
    /// are all `Err`.
    async fn fetch(&self, request: &FetchRequest) -> Result<String>;
}

/// Providers available to the resolver, keyed by kind.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderKind, Arc<dyn AcquisitionProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one of the same kind.
    pub fn with(mut self, provider: Arc<dyn AcquisitionProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn AcquisitionProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
