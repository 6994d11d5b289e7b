//! Batch orchestration: many jurisdictions, many parcels.
//!
//! Acquisition fans out over authorities with bounded concurrency and
//! isolates failures per jurisdiction. Zoning fans out over parcels on the
//! rayon pool against one immutable index; a new layer means a new index
//! for the next pass.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::resolver::{AcquisitionFailure, Document, SourceResolver};
use zoneatlas::{
    extract_standards, Extraction, Jurisdiction, JurisdictionRegistry, Parcel,
    ParcelZoningAssignment, PolygonIndex, SourceCitation, SpatialResolver,
};

/// Result of resolving one authority.
#[derive(Debug)]
pub struct AcquireOutcome {
    /// The authority that was resolved.
    pub authority: String,
    /// Requested ids served by this authority (delegating jurisdictions included).
    pub requested: Vec<String>,
    pub result: Result<Document, AcquisitionFailure>,
}

/// Group requested ids by the authority that owns their zoning.
///
/// Unknown ids and broken delegation are input errors and fail the batch.
pub fn plan_targets<'r>(
    registry: &'r JurisdictionRegistry,
    ids: &[String],
) -> Result<Vec<(&'r Jurisdiction, Vec<String>)>> {
    let mut grouped: BTreeMap<&str, (&Jurisdiction, Vec<String>)> = BTreeMap::new();
    for id in ids {
        let authority = registry.authority_of(id)?;
        grouped
            .entry(authority.id.as_str())
            .or_insert_with(|| (authority, Vec::new()))
            .1
            .push(id.clone());
    }
    Ok(grouped.into_values().collect())
}

/// Resolve every requested jurisdiction, at most `concurrency` at a time.
///
/// `on_done` sees each outcome as it completes. One failure never aborts
/// the others.
pub async fn acquire_all<F>(
    resolver: &SourceResolver,
    registry: &JurisdictionRegistry,
    ids: &[String],
    concurrency: usize,
    force_refresh: bool,
    mut on_done: F,
) -> Result<Vec<AcquireOutcome>>
where
    F: FnMut(&AcquireOutcome),
{
    let targets = plan_targets(registry, ids)?;
    tracing::info!(
        requested = ids.len(),
        authorities = targets.len(),
        concurrency,
        "acquiring sources"
    );

    let mut pending = stream::iter(targets)
        .map(|(authority, requested)| async move {
            let result = resolver.resolve(authority, force_refresh).await;
            AcquireOutcome {
                authority: authority.id.clone(),
                requested,
                result,
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut outcomes = Vec::new();
    while let Some(outcome) = pending.next().await {
        on_done(&outcome);
        outcomes.push(outcome);
    }
    outcomes.sort_by(|a, b| a.authority.cmp(&b.authority));
    Ok(outcomes)
}

/// Canonicalize an acquired document into standards.
pub fn extract_document(doc: &Document, authority: &Jurisdiction) -> Extraction {
    let source = SourceCitation {
        url: doc.source_url.clone(),
        retrieved_at: doc.fetched_at,
    };
    extract_standards(&doc.payload, authority, &source)
}

/// Resolve every parcel in parallel. Output order matches input order.
pub fn zone_parcels(
    index: &PolygonIndex,
    parcels: &[Parcel],
    authority: &Jurisdiction,
    buffer_ft: f64,
) -> Vec<ParcelZoningAssignment> {
    let resolver = SpatialResolver::new(index).with_buffer(buffer_ft);
    parcels
        .par_iter()
        .map(|parcel| resolver.resolve_parcel(parcel, authority))
        .collect()
}

/// Assignment counts for reporting.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ZoneSummary {
    pub total: usize,
    pub by_method: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
}

pub fn summarize(assignments: &[ParcelZoningAssignment]) -> ZoneSummary {
    let mut summary = ZoneSummary {
        total: assignments.len(),
        ..Default::default()
    };
    for a in assignments {
        *summary.by_method.entry(a.method.tag().to_string()).or_default() += 1;
        *summary
            .by_confidence
            .entry(a.confidence.as_str().to_string())
            .or_default() += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{AcquisitionProvider, FetchRequest, ProviderSet};
    use crate::cache::MemoryCacheStore;
    use crate::resolver::ResolverSettings;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use zoneatlas::{
        ConfidenceTier, ParcelGeometry, Point, Polygon, ProviderKind, ResolutionMethod,
    };

    fn square(x: f64, y: f64, size: f64) -> ParcelGeometry {
        ParcelGeometry::new(vec![Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
            Point::new(x, y),
        ])])
    }

    /// Serves a usable page for Orange County and a challenge page elsewhere.
    struct RoutingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AcquisitionProvider for RoutingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Http
        }

        async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.url.contains("orange_county") {
                Ok(format!(
                    "<div id=\"codecontent\"><h2>R-1AA</h2><p>Minimum lot area: 10,000 square feet.</p>{}</div>",
                    "<p>General provisions.</p>".repeat(40)
                ))
            } else {
                Ok("<title>Just a moment...</title>".to_string())
            }
        }
    }

    fn settings() -> ResolverSettings {
        ResolverSettings {
            cache_ttl: Duration::from_secs(3600),
            inter_attempt_delay: Duration::ZERO,
            provider_delay: Duration::ZERO,
            escalation_factor: 2.0,
            min_length: 500,
        }
    }

    #[test]
    fn test_plan_targets_dedupes_delegation() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let ids = vec![
            "pine-hills-fl".to_string(),
            "orange-county-fl".to_string(),
            "oak-ridge-fl".to_string(),
        ];
        let targets = plan_targets(&registry, &ids).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0.id, "orange-county-fl");
        assert_eq!(targets[0].1.len(), 3);

        assert!(plan_targets(&registry, &["atlantis".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_acquire_all_isolates_failures() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let provider = Arc::new(RoutingProvider {
            calls: AtomicUsize::new(0),
        });
        // Only the HTTP provider is configured; rendered rungs error out.
        let resolver = SourceResolver::new(
            ProviderSet::new().with(provider.clone()),
            Arc::new(MemoryCacheStore::new()),
            settings(),
        );
        let ids = vec![
            "pine-hills-fl".to_string(),
            "winter-park-fl".to_string(),
        ];
        let mut seen = 0;
        let outcomes = acquire_all(&resolver, &registry, &ids, 4, false, |_| seen += 1)
            .await
            .unwrap();

        assert_eq!(seen, 2);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].authority, "orange-county-fl");
        assert_eq!(outcomes[0].requested, vec!["pine-hills-fl".to_string()]);
        let doc = outcomes[0].result.as_ref().unwrap();
        assert_eq!(outcomes[1].authority, "winter-park-fl");
        assert!(outcomes[1].result.is_err());

        let extraction = extract_document(doc, registry.get("orange-county-fl").unwrap());
        assert_eq!(extraction.standards.len(), 1);
        assert_eq!(extraction.standards[0].min_lot_area_sqft, Some(10_000));
        assert_eq!(extraction.standards[0].source.url, doc.source_url);
    }

    #[test]
    fn test_zone_parcels_and_summary() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let authority = registry.get("orange-county-fl").unwrap();
        let index = PolygonIndex::new(vec![
            ("R-1AA".to_string(), square(0.0, 0.0, 100.0)),
            ("C-1".to_string(), square(1_000.0, 0.0, 100.0)),
        ]);
        let parcels = vec![
            Parcel {
                parcel_id: "P1".to_string(),
                use_code: None,
                geometry: square(10.0, 10.0, 20.0),
            },
            Parcel {
                parcel_id: "P2".to_string(),
                use_code: None,
                geometry: square(1_010.0, 10.0, 20.0),
            },
            Parcel {
                parcel_id: "P3".to_string(),
                use_code: None,
                geometry: ParcelGeometry::empty(),
            },
        ];

        let assignments = zone_parcels(&index, &parcels, authority, 100.0);
        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0].parcel_id, "P1");
        assert_eq!(assignments[0].district_code, "R-1AA");
        assert_eq!(assignments[1].district_code, "C-1");
        assert_eq!(assignments[2].method, ResolutionMethod::Baseline);
        assert_eq!(assignments[2].district_code, "R-1");
        assert_eq!(assignments[2].confidence, ConfidenceTier::Low);

        let summary = summarize(&assignments);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_method.get("centroid"), Some(&2));
        assert_eq!(summary.by_confidence.get("LOW"), Some(&1));
    }
}
