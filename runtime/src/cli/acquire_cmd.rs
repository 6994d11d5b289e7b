//! `zoneatlas acquire`: fetch and cache ordinance sources.

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::audit::ReviewQueue;
use crate::batch::{acquire_all, AcquireOutcome};
use crate::cli::{build_resolver, output};
use crate::config::RuntimeConfig;

/// Acquire the given jurisdictions (or every authority with `all`).
pub async fn run(
    config: &RuntimeConfig,
    ids: &[String],
    all: bool,
    force: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let registry = config.load_registry()?;
    let ids: Vec<String> = if all {
        registry.authorities().map(|j| j.id.clone()).collect()
    } else {
        ids.to_vec()
    };
    if ids.is_empty() {
        bail!("no jurisdictions given; pass ids or --all");
    }

    let resolver = build_resolver(config)?;
    let mut review = ReviewQueue::open(&config.review_log)?;
    let concurrency = concurrency.unwrap_or(config.concurrency);

    let progress = if output::is_quiet() || output::is_json() {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(ids.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("  {bar:30} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        bar
    };

    let outcomes = acquire_all(&resolver, &registry, &ids, concurrency, force, |o| {
        progress.inc(o.requested.len() as u64);
        progress.set_message(o.authority.clone());
    })
    .await?;
    progress.finish_and_clear();

    for outcome in &outcomes {
        let logged = match &outcome.result {
            Ok(doc) => review.record_document(doc),
            Err(failure) => review.record_failure(failure),
        };
        if let Err(e) = logged {
            tracing::warn!("failed to write review queue: {e:#}");
        }
    }

    report(&outcomes);

    if outcomes.iter().all(|o| o.result.is_err()) {
        bail!("no sources acquired; see {}", config.review_log.display());
    }
    Ok(())
}

fn report(outcomes: &[AcquireOutcome]) {
    if output::is_json() {
        let items: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(doc) => serde_json::json!({
                    "authority": o.authority,
                    "requested": o.requested,
                    "ok": true,
                    "origin": doc.origin,
                    "stale": doc.is_stale(),
                    "length": doc.payload.len(),
                    "attempts": doc.attempts,
                }),
                Err(failure) => serde_json::json!({
                    "authority": o.authority,
                    "requested": o.requested,
                    "ok": false,
                    "last_outcome": failure.last_outcome,
                    "attempts": failure.attempts,
                }),
            })
            .collect();
        output::print_json(&serde_json::json!({ "results": items }));
        return;
    }
    if output::is_quiet() {
        return;
    }

    let s = output::Styled::new();
    for o in outcomes {
        match &o.result {
            Ok(doc) => {
                let note = if doc.is_stale() { " (stale)" } else { "" };
                println!(
                    "  {} {:<24} {:?}{note}, {} chars, {} attempts",
                    s.ok_sym(),
                    o.authority,
                    doc.origin,
                    doc.payload.len(),
                    doc.attempts.len()
                );
            }
            Err(failure) => {
                println!(
                    "  {} {:<24} failed after {} attempts",
                    s.fail_sym(),
                    o.authority,
                    failure.attempts.len()
                );
                if output::is_verbose() {
                    for a in &failure.attempts {
                        println!(
                            "      {:<32} {:?} {}",
                            a.strategy,
                            a.outcome,
                            s.dim(a.error.as_deref().unwrap_or(""))
                        );
                    }
                }
            }
        }
    }
}
