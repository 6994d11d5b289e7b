//! Zoning polygon index.
//!
//! The spatial resolver only needs two questions answered: which district
//! contains a point, and which district best overlaps a (possibly
//! buffered) envelope. [`ZoningIndex`] is that seam; [`PolygonIndex`] is the
//! in-memory implementation built from a county zoning layer.

use crate::geometry::{parse_feature_collection, Envelope, ParcelGeometry, Point};
use crate::registry::normalize_code;
use crate::types::GeometryError;

/// Spatial lookups over a zoning layer.
pub trait ZoningIndex: Send + Sync {
    /// District code of the polygon containing `point`.
    fn point_query(&self, point: Point) -> Option<String>;

    /// District code with the largest bounding-box overlap with `envelope`
    /// grown by `buffer_ft`.
    fn envelope_query(&self, envelope: &Envelope, buffer_ft: f64) -> Option<String>;
}

/// One zoning polygon with its precomputed bounding box.
#[derive(Debug, Clone)]
pub struct ZoningPolygon {
    pub district_code: String,
    pub geometry: ParcelGeometry,
    pub envelope: Envelope,
}

/// Immutable in-memory index. Rebuilt, never edited, when the layer changes.
#[derive(Debug, Clone, Default)]
pub struct PolygonIndex {
    polygons: Vec<ZoningPolygon>,
}

impl PolygonIndex {
    /// Build from `(district_code, geometry)` pairs. Empty geometries and
    /// blank codes are dropped.
    pub fn new(entries: impl IntoIterator<Item = (String, ParcelGeometry)>) -> Self {
        let polygons = entries
            .into_iter()
            .filter_map(|(code, geometry)| {
                let code = normalize_code(&code);
                if code.is_empty() {
                    return None;
                }
                let envelope = geometry.envelope()?;
                Some(ZoningPolygon {
                    district_code: code,
                    geometry,
                    envelope,
                })
            })
            .collect();
        Self { polygons }
    }

    /// Load a zoning layer from a GeoJSON FeatureCollection, reading the
    /// district code from `code_property`.
    pub fn from_geojson(content: &str, code_property: &str) -> Result<Self, GeometryError> {
        let features = parse_feature_collection(content)?;
        let total = features.len();
        let index = Self::new(features.into_iter().filter_map(|f| {
            let code = f.property_str(code_property)?;
            Some((code, f.geometry))
        }));
        if total > 0 && index.is_empty() {
            return Err(GeometryError::Invalid(format!(
                "no zoning polygons carry a {code_property:?} property"
            )));
        }
        tracing::debug!(
            "zoning index built: {} of {} features usable",
            index.len(),
            total
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[ZoningPolygon] {
        &self.polygons
    }
}

impl ZoningIndex for PolygonIndex {
    fn point_query(&self, point: Point) -> Option<String> {
        if !point.is_finite() {
            return None;
        }
        self.polygons
            .iter()
            .find(|z| z.envelope.contains(point) && z.geometry.contains(point))
            .map(|z| z.district_code.clone())
    }

    fn envelope_query(&self, envelope: &Envelope, buffer_ft: f64) -> Option<String> {
        let window = envelope.expand(buffer_ft.max(0.0));
        let mut best: Option<(&ZoningPolygon, f64)> = None;
        for zone in &self.polygons {
            let Some(overlap) = zone.envelope.intersection(&window) else {
                continue;
            };
            let area = overlap.area();
            // Ties keep the earlier polygon.
            if best.map_or(true, |(_, best_area)| area > best_area) {
                best = Some((zone, area));
            }
        }
        best.map(|(zone, _)| zone.district_code.clone())
    }
}
