//! Spatial zoning resolution: parcel geometry → district assignment.
//!
//! Resolution walks a fixed ladder of methods, each paired with the
//! confidence tier it earns. Point queries come first, then envelope
//! overlap, then non-spatial fallbacks. The last rung (the baseline
//! district) cannot fail, so every parcel gets an assignment.

use chrono::Utc;

use crate::chain::first_success;
use crate::geometry::{parse_feature_collection, Envelope, ParcelGeometry};
use crate::index::ZoningIndex;
use crate::registry::Jurisdiction;
use crate::types::{ConfidenceTier, GeometryError, ParcelZoningAssignment, ResolutionMethod};
use crate::use_codes::classify;

/// Default envelope buffer, in feet.
pub const DEFAULT_BUFFER_FT: f64 = 100.0;

/// District assumed when a jurisdiction configures no baseline.
pub const FALLBACK_BASELINE: &str = "R-1";

/// A resolution method and the confidence it earns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialMethod {
    pub method: ResolutionMethod,
    pub confidence: ConfidenceTier,
}

const fn step(method: ResolutionMethod, confidence: ConfidenceTier) -> SpatialMethod {
    SpatialMethod { method, confidence }
}

/// Every rung that can come up empty, in order. The baseline rung follows.
pub const FALLIBLE_CHAIN: [SpatialMethod; 7] = [
    step(ResolutionMethod::Centroid, ConfidenceTier::High),
    step(ResolutionMethod::BboxCenter, ConfidenceTier::High),
    step(ResolutionMethod::BboxOffset25, ConfidenceTier::High),
    step(ResolutionMethod::BboxOffset75, ConfidenceTier::High),
    step(ResolutionMethod::Envelope, ConfidenceTier::Medium),
    step(ResolutionMethod::BufferedEnvelope, ConfidenceTier::Medium),
    step(ResolutionMethod::UseCode, ConfidenceTier::Low),
];

pub const BASELINE: SpatialMethod = step(ResolutionMethod::Baseline, ConfidenceTier::Low);

/// A parcel as read from an assessor layer.
#[derive(Debug, Clone)]
pub struct Parcel {
    pub parcel_id: String,
    pub use_code: Option<String>,
    pub geometry: ParcelGeometry,
}

/// Resolves parcels against one zoning authority's polygon index.
pub struct SpatialResolver<'a> {
    index: &'a dyn ZoningIndex,
    buffer_ft: f64,
}

impl<'a> SpatialResolver<'a> {
    pub fn new(index: &'a dyn ZoningIndex) -> Self {
        Self {
            index,
            buffer_ft: DEFAULT_BUFFER_FT,
        }
    }

    pub fn with_buffer(mut self, buffer_ft: f64) -> Self {
        self.buffer_ft = buffer_ft;
        self
    }

    /// Assign a district to one parcel. Never fails.
    ///
    /// `authority` is the jurisdiction owning zoning for the parcel; its
    /// use-code defaults and baseline district back the spatial rungs.
    pub fn resolve_zone(
        &self,
        parcel_id: &str,
        geometry: &ParcelGeometry,
        authority: &Jurisdiction,
        use_code: Option<&str>,
    ) -> ParcelZoningAssignment {
        let envelope = geometry.envelope();
        let centroid = || geometry.centroid();
        let sample = |fx: f64, fy: f64| {
            envelope.and_then(|e| self.index.point_query(e.at_fraction(fx, fy)))
        };
        let overlap = |buffer: f64| -> Option<String> {
            let e: Envelope = envelope?;
            self.index.envelope_query(&e, buffer)
        };

        let hit = first_success(FALLIBLE_CHAIN, |s| match s.method {
            ResolutionMethod::Centroid => centroid().and_then(|p| self.index.point_query(p)),
            ResolutionMethod::BboxCenter => sample(0.5, 0.5),
            ResolutionMethod::BboxOffset25 => sample(0.25, 0.25),
            ResolutionMethod::BboxOffset75 => sample(0.75, 0.75),
            ResolutionMethod::Envelope => overlap(0.0),
            ResolutionMethod::BufferedEnvelope => overlap(self.buffer_ft),
            ResolutionMethod::UseCode => use_code
                .and_then(classify)
                .and_then(|category| authority.default_for(category))
                .map(str::to_string),
            ResolutionMethod::Baseline => None,
        });

        let (chosen, district_code) = match hit {
            Some(hit) => (hit.step, hit.value),
            None => (BASELINE, baseline_code(authority).to_string()),
        };

        if chosen.confidence < ConfidenceTier::High {
            tracing::debug!(
                parcel = parcel_id,
                method = chosen.method.tag(),
                "parcel resolved below HIGH confidence"
            );
        }

        ParcelZoningAssignment {
            parcel_id: parcel_id.to_string(),
            jurisdiction_id: authority.id.clone(),
            district_code,
            confidence: chosen.confidence,
            method: chosen.method,
            resolved_at: Utc::now(),
        }
    }

    pub fn resolve_parcel(&self, parcel: &Parcel, authority: &Jurisdiction) -> ParcelZoningAssignment {
        self.resolve_zone(
            &parcel.parcel_id,
            &parcel.geometry,
            authority,
            parcel.use_code.as_deref(),
        )
    }
}

fn baseline_code(authority: &Jurisdiction) -> &str {
    authority
        .baseline_district
        .as_deref()
        .unwrap_or(FALLBACK_BASELINE)
}

/// Load parcels from a GeoJSON FeatureCollection.
///
/// The parcel id is read from `id_property`, falling back to the feature
/// id; features with neither are rejected.
pub fn parcels_from_geojson(
    content: &str,
    id_property: &str,
    use_code_property: Option<&str>,
) -> Result<Vec<Parcel>, GeometryError> {
    parse_feature_collection(content)?
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            let parcel_id = feature
                .property_str(id_property)
                .or_else(|| feature.id.clone())
                .ok_or_else(|| {
                    GeometryError::Invalid(format!("feature {i} has no {id_property:?} or id"))
                })?;
            let use_code = use_code_property.and_then(|key| feature.property_str(key));
            Ok(Parcel {
                parcel_id,
                use_code,
                geometry: feature.geometry,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::index::PolygonIndex;
    use crate::registry::JurisdictionRegistry;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> ParcelGeometry {
        ParcelGeometry::new(vec![Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
            Point::new(x0, y0),
        ])])
    }

    fn county() -> Jurisdiction {
        JurisdictionRegistry::builtin()
            .unwrap()
            .get("orange-county-fl")
            .unwrap()
            .clone()
    }

    fn layer() -> PolygonIndex {
        PolygonIndex::new(vec![
            ("R-1AA".to_string(), rect(0.0, 0.0, 1000.0, 1000.0)),
            ("C-2".to_string(), rect(2000.0, 0.0, 3000.0, 1000.0)),
        ])
    }

    #[test]
    fn test_centroid_hit_is_high() {
        let idx = layer();
        let resolver = SpatialResolver::new(&idx);
        let a = resolver.resolve_zone("p1", &rect(100.0, 100.0, 200.0, 200.0), &county(), None);
        assert_eq!(a.district_code, "R-1AA");
        assert_eq!(a.method, ResolutionMethod::Centroid);
        assert_eq!(a.confidence, ConfidenceTier::High);
        assert_eq!(a.jurisdiction_id, "orange-county-fl");
    }

    #[test]
    fn test_offset_point_when_centroid_misses() {
        // Zoning covers only the lower-left quarter of the parcel's bbox.
        let idx = PolygonIndex::new(vec![("R-2".to_string(), rect(0.0, 0.0, 40.0, 40.0))]);
        let resolver = SpatialResolver::new(&idx);
        let a = resolver.resolve_zone("p2", &rect(0.0, 0.0, 100.0, 100.0), &county(), None);
        assert_eq!(a.method, ResolutionMethod::BboxOffset25);
        assert_eq!(a.confidence, ConfidenceTier::High);
        assert_eq!(a.district_code, "R-2");
    }

    #[test]
    fn test_envelope_and_buffer_are_medium() {
        let idx = PolygonIndex::new(vec![("C-1".to_string(), rect(95.0, 0.0, 200.0, 100.0))]);
        let resolver = SpatialResolver::new(&idx);
        // Overlaps only on the right edge; every sample point misses.
        let a = resolver.resolve_zone("p3", &rect(0.0, 0.0, 96.0, 100.0), &county(), None);
        assert_eq!(a.method, ResolutionMethod::Envelope);
        assert_eq!(a.confidence, ConfidenceTier::Medium);

        let a = resolver.resolve_zone("p4", &rect(-100.0, 0.0, 0.0, 100.0), &county(), None);
        assert_eq!(a.method, ResolutionMethod::BufferedEnvelope);
        assert_eq!(a.district_code, "C-1");

        // Beyond the default buffer, a wider one still reaches.
        let far = rect(-300.0, 0.0, -200.0, 100.0);
        let a = resolver.resolve_zone("p5", &far, &county(), None);
        assert_ne!(a.method, ResolutionMethod::BufferedEnvelope);
        let a = SpatialResolver::new(&idx)
            .with_buffer(400.0)
            .resolve_zone("p5", &far, &county(), None);
        assert_eq!(a.method, ResolutionMethod::BufferedEnvelope);
    }

    #[test]
    fn test_use_code_fallback_is_low() {
        let idx = layer();
        let resolver = SpatialResolver::new(&idx);
        let a = resolver.resolve_zone("p6", &ParcelGeometry::empty(), &county(), Some("1100"));
        assert_eq!(a.method, ResolutionMethod::UseCode);
        assert_eq!(a.confidence, ConfidenceTier::Low);
        assert_eq!(a.district_code, "C-1");
    }

    #[test]
    fn test_total_on_empty_and_degenerate_geometry() {
        let idx = PolygonIndex::default();
        let resolver = SpatialResolver::new(&idx);
        let county = county();

        let empty = resolver.resolve_zone("e", &ParcelGeometry::empty(), &county, None);
        assert_eq!(empty.method, ResolutionMethod::Baseline);
        assert_eq!(empty.confidence, ConfidenceTier::Low);
        assert_eq!(empty.district_code, "R-1");

        let nan = ParcelGeometry::new(vec![Polygon::new(vec![Point::new(f64::NAN, f64::INFINITY)])]);
        let a = resolver.resolve_zone("n", &nan, &county, Some("9400"));
        assert_eq!(a.method, ResolutionMethod::Baseline);

        let sliver = ParcelGeometry::new(vec![Polygon::new(vec![Point::new(5.0, 5.0); 4])]);
        let a = resolver.resolve_zone("s", &sliver, &county, None);
        assert_eq!(a.method, ResolutionMethod::Baseline);
    }

    #[test]
    fn test_baseline_without_configured_district() {
        let idx = PolygonIndex::default();
        let mut town = county();
        town.baseline_district = None;
        let a = SpatialResolver::new(&idx).resolve_zone("x", &ParcelGeometry::empty(), &town, None);
        assert_eq!(a.district_code, FALLBACK_BASELINE);
    }

    #[test]
    fn test_degenerate_point_parcel_inside_zone() {
        let idx = layer();
        let point_parcel = ParcelGeometry::new(vec![Polygon::new(vec![Point::new(500.0, 500.0); 3])]);
        let a = SpatialResolver::new(&idx).resolve_zone("pt", &point_parcel, &county(), None);
        assert_eq!(a.method, ResolutionMethod::Centroid);
        assert_eq!(a.district_code, "R-1AA");
    }

    #[test]
    fn test_parcels_from_geojson() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"PARCEL": "292234000000001", "DOR_UC": "0100"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
            {"type": "Feature", "id": "fallback-id", "properties": {}, "geometry": null}
        ]}"#;
        let parcels = parcels_from_geojson(json, "PARCEL", Some("DOR_UC")).unwrap();
        assert_eq!(parcels[0].parcel_id, "292234000000001");
        assert_eq!(parcels[0].use_code.as_deref(), Some("0100"));
        assert_eq!(parcels[1].parcel_id, "fallback-id");
        assert!(parcels[1].geometry.is_empty());

        let missing = r#"{"features": [{"properties": {}, "geometry": null}]}"#;
        assert!(parcels_from_geojson(missing, "PARCEL", None).is_err());
    }
}
