//! Source acquisition resolver: walks a jurisdiction's strategy ladder.
//!
//! A fresh cache entry short-circuits everything. Otherwise rungs are
//! tried strictly in order; each response is validated and only a USABLE
//! payload is promoted to the cache and returned. A BLOCKED, EMPTY,
//! errored or timed-out rung costs a fixed pause, and the next rendered
//! rung gets one widened wait/timeout. Exhausting the ladder yields a
//! typed [`AcquisitionFailure`], never a bad payload. Rungs are driven by
//! [`zoneatlas::first_success_async`], the same first-success walk the
//! spatial resolver uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::acquisition::{FetchRequest, ProviderSet};
use crate::cache::{cache_key, CacheStore, CachedDocument};
use crate::config::RuntimeConfig;
use crate::throttle::ProviderThrottle;
use zoneatlas::{
    first_success_async, inspect, AcquisitionStrategy, AttemptOutcome, Jurisdiction, ProviderKind,
    RenderMode,
};

/// Extra time granted past a rung's own timeout before the resolver gives up on it.
const HARD_TIMEOUT_GRACE_MS: u64 = 1_000;

/// Record of one rung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionAttempt {
    pub strategy: String,
    pub provider: Option<ProviderKind>,
    pub outcome: AttemptOutcome,
    pub wait_ms: u64,
    pub timeout_ms: u64,
    /// Whether this rung ran with the widened wait/timeout.
    pub escalated: bool,
    pub length: usize,
    pub markers: Vec<String>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Where a returned document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    /// Fresh cache entry; no network calls.
    Cache,
    /// Fetched and validated on this call.
    Fetched,
    /// Expired cache entry returned by a `stale_cache` rung.
    StaleCache,
}

/// A validated source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub jurisdiction_id: String,
    pub source_url: String,
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
    pub origin: DocumentOrigin,
    pub attempts: Vec<AcquisitionAttempt>,
}

impl Document {
    pub fn is_stale(&self) -> bool {
        self.origin == DocumentOrigin::StaleCache
    }

    fn from_cache(doc: CachedDocument, origin: DocumentOrigin, attempts: Vec<AcquisitionAttempt>) -> Self {
        Self {
            jurisdiction_id: doc.jurisdiction_id,
            source_url: doc.source_url,
            payload: doc.payload,
            fetched_at: doc.fetched_at,
            origin,
            attempts,
        }
    }
}

/// Every rung failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("acquisition failed for {jurisdiction} after {} attempts", .attempts.len())]
pub struct AcquisitionFailure {
    pub jurisdiction: String,
    /// Classification of the last fetch rung, if any ran.
    pub last_outcome: Option<AttemptOutcome>,
    pub attempts: Vec<AcquisitionAttempt>,
}

/// Ladder tuning.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub cache_ttl: Duration,
    pub inter_attempt_delay: Duration,
    pub provider_delay: Duration,
    pub escalation_factor: f64,
    pub min_length: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for ResolverSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl,
            inter_attempt_delay: config.inter_attempt_delay,
            provider_delay: config.provider_delay,
            escalation_factor: config.escalation_factor,
            min_length: config.min_length,
        }
    }
}

/// What every rung of one resolve call works against.
struct LadderTarget<'a> {
    authority: &'a Jurisdiction,
    url: &'a str,
    key: &'a str,
    /// Entry read before the ladder started, fresh or not.
    cached: Option<&'a CachedDocument>,
}

/// Carried from rung to rung.
#[derive(Default)]
struct LadderState {
    attempts: Vec<AcquisitionAttempt>,
    last_outcome: Option<AttemptOutcome>,
    /// A fetch rung has failed, so the next rendered rung may widen.
    escalate_next: bool,
    /// The single widening has been spent.
    escalated: bool,
}

pub struct SourceResolver {
    providers: ProviderSet,
    cache: Arc<dyn CacheStore>,
    throttle: ProviderThrottle,
    settings: ResolverSettings,
}

impl SourceResolver {
    pub fn new(providers: ProviderSet, cache: Arc<dyn CacheStore>, settings: ResolverSettings) -> Self {
        Self {
            providers,
            cache,
            throttle: ProviderThrottle::new(settings.provider_delay),
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Acquire the source document of `authority`, the jurisdiction that
    /// owns zoning (delegation already followed).
    pub async fn resolve(
        &self,
        authority: &Jurisdiction,
        force_refresh: bool,
    ) -> Result<Document, AcquisitionFailure> {
        let Some(url) = authority.source_url.as_deref() else {
            tracing::warn!(jurisdiction = %authority.id, "no source URL configured");
            return Err(AcquisitionFailure {
                jurisdiction: authority.id.clone(),
                last_outcome: None,
                attempts: Vec::new(),
            });
        };
        let key = cache_key(&authority.id, url);
        let cached = self.cached(&key);

        if !force_refresh {
            if let Some(doc) = cached.clone() {
                if doc.is_fresh(self.settings.cache_ttl, Utc::now()) {
                    tracing::debug!(jurisdiction = %authority.id, "cache hit");
                    return Ok(Document::from_cache(doc, DocumentOrigin::Cache, Vec::new()));
                }
            }
        }

        let target = LadderTarget {
            authority,
            url,
            key: &key,
            cached: cached.as_ref(),
        };
        let target = &target;
        let (hit, state) = first_success_async(
            authority.strategies.iter().enumerate(),
            LadderState::default(),
            move |(i, strategy), state| self.rung(target, i, strategy, state),
        )
        .await;
        if let Some(hit) = hit {
            return Ok(hit.value);
        }

        tracing::warn!(
            jurisdiction = %authority.id,
            attempts = state.attempts.len(),
            last_outcome = ?state.last_outcome,
            "acquisition ladder exhausted"
        );
        Err(AcquisitionFailure {
            jurisdiction: authority.id.clone(),
            last_outcome: state.last_outcome,
            attempts: state.attempts,
        })
    }

    /// Run the rung at position `i` of the target's ladder.
    async fn rung(
        &self,
        target: &LadderTarget<'_>,
        i: usize,
        strategy: &AcquisitionStrategy,
        mut state: LadderState,
    ) -> (Option<Document>, LadderState) {
        let authority = target.authority;
        match strategy {
            AcquisitionStrategy::StaleCache => {
                let mut attempt = AcquisitionAttempt {
                    strategy: strategy.label(),
                    provider: None,
                    outcome: AttemptOutcome::Empty,
                    wait_ms: 0,
                    timeout_ms: 0,
                    escalated: false,
                    length: 0,
                    markers: Vec::new(),
                    error: None,
                    elapsed_ms: 0,
                };
                let Some(doc) = target.cached.cloned() else {
                    attempt.error = Some("no cached entry".to_string());
                    state.attempts.push(attempt);
                    return (None, state);
                };
                attempt.outcome = AttemptOutcome::Usable;
                attempt.length = doc.payload.chars().count();
                state.attempts.push(attempt);
                tracing::warn!(
                    jurisdiction = %authority.id,
                    fetched_at = %doc.fetched_at,
                    "serving stale cached document"
                );
                let attempts = std::mem::take(&mut state.attempts);
                let doc = Document::from_cache(doc, DocumentOrigin::StaleCache, attempts);
                (Some(doc), state)
            }
            AcquisitionStrategy::Fetch {
                provider,
                render,
                wait_ms,
                timeout_ms,
                min_length,
            } => {
                let widen = state.escalate_next && !state.escalated && *render == RenderMode::Rendered;
                let factor = if widen { self.settings.escalation_factor } else { 1.0 };
                state.escalated |= widen;

                let request = FetchRequest {
                    url: target.url.to_string(),
                    render: *render,
                    wait_ms: scale(*wait_ms, factor),
                    timeout_ms: scale(*timeout_ms, factor),
                };
                let floor = min_length.unwrap_or(self.settings.min_length);
                let (mut attempt, payload) = self.attempt(*provider, &request, floor).await;
                attempt.strategy = strategy.label();
                attempt.escalated = widen;

                tracing::info!(
                    jurisdiction = %authority.id,
                    strategy = %attempt.strategy,
                    outcome = ?attempt.outcome,
                    elapsed_ms = attempt.elapsed_ms,
                    length = attempt.length,
                    "acquisition attempt"
                );

                state.last_outcome = Some(attempt.outcome);
                state.attempts.push(attempt);

                if let Some(payload) = payload {
                    let doc = CachedDocument {
                        jurisdiction_id: authority.id.clone(),
                        source_url: target.url.to_string(),
                        payload,
                        fetched_at: Utc::now(),
                    };
                    if let Err(e) = self.cache.put(target.key, &doc) {
                        tracing::warn!(jurisdiction = %authority.id, "cache promotion failed: {e:#}");
                    }
                    let attempts = std::mem::take(&mut state.attempts);
                    return (Some(Document::from_cache(doc, DocumentOrigin::Fetched, attempts)), state);
                }

                state.escalate_next = true;
                let next_fetches = authority.strategies[i + 1..]
                    .iter()
                    .any(|s| matches!(s, AcquisitionStrategy::Fetch { .. }));
                if next_fetches && !self.settings.inter_attempt_delay.is_zero() {
                    tokio::time::sleep(self.settings.inter_attempt_delay).await;
                }
                (None, state)
            }
        }
    }

    fn cached(&self, key: &str) -> Option<CachedDocument> {
        match self.cache.get(key) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("cache read failed for {key}: {e:#}");
                None
            }
        }
    }

    /// Run one fetch rung. Returns the payload only when it validated USABLE.
    async fn attempt(
        &self,
        kind: ProviderKind,
        request: &FetchRequest,
        min_length: usize,
    ) -> (AcquisitionAttempt, Option<String>) {
        let mut attempt = AcquisitionAttempt {
            strategy: String::new(),
            provider: Some(kind),
            outcome: AttemptOutcome::Error,
            wait_ms: request.wait_ms,
            timeout_ms: request.timeout_ms,
            escalated: false,
            length: 0,
            markers: Vec::new(),
            error: None,
            elapsed_ms: 0,
        };

        let Some(provider) = self.providers.get(kind) else {
            attempt.error = Some(format!("provider {} not configured", kind.as_str()));
            return (attempt, None);
        };

        // Lazy setup (browser launch) is not part of the rung's time budget.
        if let Err(e) = provider.prepare().await {
            attempt.error = Some(format!("{e:#}"));
            return (attempt, None);
        }

        self.throttle.acquire(kind).await;
        let start = Instant::now();
        let hard_limit =
            Duration::from_millis(request.timeout_ms + request.wait_ms + HARD_TIMEOUT_GRACE_MS);
        let result = tokio::time::timeout(hard_limit, provider.fetch(request)).await;
        attempt.elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(text)) => {
                let verdict = inspect(&text, min_length);
                attempt.outcome = verdict.status.into();
                attempt.length = verdict.length;
                attempt.markers = verdict.markers;
                let usable = attempt.outcome == AttemptOutcome::Usable;
                (attempt, usable.then_some(text))
            }
            Ok(Err(e)) => {
                attempt.error = Some(format!("{e:#}"));
                (attempt, None)
            }
            Err(_) => {
                attempt.error = Some(format!("timed out after {}ms", hard_limit.as_millis()));
                (attempt, None)
            }
        }
    }
}

fn scale(value: u64, factor: f64) -> u64 {
    if factor <= 1.0 {
        return value;
    }
    (value as f64 * factor).round() as u64
}
