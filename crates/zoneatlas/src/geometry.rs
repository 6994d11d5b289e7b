//! Planar geometry for parcels and zoning polygons.
//!
//! Coordinates are assumed to be in a projected CRS measured in feet (the
//! state-plane layers county GIS offices publish), so buffers and areas
//! are plain Euclidean arithmetic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Bounding box of the finite points in `points`; `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut env: Option<Envelope> = None;
        for p in points.into_iter().filter(|p| p.is_finite()) {
            env = Some(match env {
                None => Envelope {
                    min_x: p.x,
                    min_y: p.y,
                    max_x: p.x,
                    max_y: p.y,
                },
                Some(e) => Envelope {
                    min_x: e.min_x.min(p.x),
                    min_y: e.min_y.min(p.y),
                    max_x: e.max_x.max(p.x),
                    max_y: e.max_y.max(p.y),
                },
            });
        }
        env
    }

    /// Grow the box by `distance` on every side.
    pub fn expand(&self, distance: f64) -> Self {
        Self {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    /// Boxes that share any point, including an edge, intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        self.intersects(other).then(|| Envelope {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        self.at_fraction(0.5, 0.5)
    }

    /// Point at fractional offsets from the lower-left corner.
    pub fn at_fraction(&self, fx: f64, fy: f64) -> Point {
        Point::new(self.min_x + self.width() * fx, self.min_y + self.height() * fy)
    }
}

/// Simple polygon: one exterior ring and any number of holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default)]
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Even-odd containment; points inside a hole are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.is_finite()
            && ring_contains(&self.exterior, p)
            && !self.holes.iter().any(|h| ring_contains(h, p))
    }

    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_points(&self.exterior)
    }

    /// Unsigned area (exterior minus holes) and area centroid.
    fn area_centroid(&self) -> (f64, Point) {
        let (outer, oc) = ring_area_centroid(&self.exterior);
        let mut area = outer.abs();
        let mut sx = oc.x * area;
        let mut sy = oc.y * area;
        for hole in &self.holes {
            let (a, c) = ring_area_centroid(hole);
            let a = a.abs();
            if a == 0.0 || !c.is_finite() {
                continue;
            }
            area -= a;
            sx -= c.x * a;
            sy -= c.y * a;
        }
        if area.abs() < f64::EPSILON {
            return (0.0, oc);
        }
        (area, Point::new(sx / area, sy / area))
    }
}

fn ring_contains(ring: &[Point], p: Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Signed shoelace area and centroid of a ring (open or closed).
fn ring_area_centroid(ring: &[Point]) -> (f64, Point) {
    let n = ring.len();
    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        twice_area += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    if twice_area.abs() < f64::EPSILON {
        return (0.0, Point::new(f64::NAN, f64::NAN));
    }
    let area = twice_area / 2.0;
    (area, Point::new(cx / (6.0 * area), cy / (6.0 * area)))
}

/// A parcel or zoning footprint: zero or more polygons.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParcelGeometry {
    pub polygons: Vec<Polygon>,
}

impl ParcelGeometry {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// No finite vertex at all.
    pub fn is_empty(&self) -> bool {
        self.envelope().is_none()
    }

    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_points(self.polygons.iter().flat_map(|p| p.exterior.iter()))
    }

    pub fn contains(&self, p: Point) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    /// Area-weighted centroid.
    ///
    /// Zero-area geometry (slivers, lines, repeated points) falls back to
    /// the mean of its finite vertices. Empty geometry has no centroid.
    pub fn centroid(&self) -> Option<Point> {
        let mut area = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        for poly in &self.polygons {
            let (a, c) = poly.area_centroid();
            if a > 0.0 && c.is_finite() {
                area += a;
                sx += c.x * a;
                sy += c.y * a;
            }
        }
        if area > 0.0 {
            let c = Point::new(sx / area, sy / area);
            if c.is_finite() {
                return Some(c);
            }
        }

        let finite: Vec<&Point> = self
            .polygons
            .iter()
            .flat_map(|p| p.exterior.iter())
            .filter(|p| p.is_finite())
            .collect();
        if finite.is_empty() {
            return None;
        }
        let n = finite.len() as f64;
        Some(Point::new(
            finite.iter().map(|p| p.x).sum::<f64>() / n,
            finite.iter().map(|p| p.y).sum::<f64>() / n,
        ))
    }
}

/// A GeoJSON feature reduced to what the resolvers need.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: ParcelGeometry,
}

impl GeoFeature {
    /// A property as a string; numeric values are formatted.
    pub fn property_str(&self, key: &str) -> Option<String> {
        value_as_string(self.properties.get(key)?)
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a GeoJSON FeatureCollection.
///
/// Polygon and MultiPolygon geometries are read; features with a null or
/// other geometry type are kept with empty geometry.
pub fn parse_feature_collection(content: &str) -> Result<Vec<GeoFeature>, GeometryError> {
    let root: Value = serde_json::from_str(content)?;
    let features = root
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| GeometryError::Invalid("expected a FeatureCollection".to_string()))?;

    features
        .iter()
        .map(|feature| {
            let properties = feature
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let geometry = match feature.get("geometry") {
                Some(g) if !g.is_null() => geometry_from_geojson(g)?,
                _ => ParcelGeometry::empty(),
            };
            Ok(GeoFeature {
                id: feature.get("id").and_then(value_as_string),
                properties,
                geometry,
            })
        })
        .collect()
}

/// Convert a GeoJSON geometry object.
pub fn geometry_from_geojson(geometry: &Value) -> Result<ParcelGeometry, GeometryError> {
    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("");
    let coords = geometry.get("coordinates");
    match (kind, coords) {
        ("Polygon", Some(c)) => Ok(ParcelGeometry::new(vec![polygon_from(c)?])),
        ("MultiPolygon", Some(c)) => {
            let parts = c
                .as_array()
                .ok_or_else(|| GeometryError::Invalid("MultiPolygon coordinates".to_string()))?;
            let polygons = parts.iter().map(polygon_from).collect::<Result<Vec<_>, _>>()?;
            Ok(ParcelGeometry::new(polygons))
        }
        ("Polygon" | "MultiPolygon", None) => Err(GeometryError::Invalid(format!(
            "{kind} without coordinates"
        ))),
        _ => {
            tracing::debug!("ignoring unsupported geometry type {kind:?}");
            Ok(ParcelGeometry::empty())
        }
    }
}

fn polygon_from(value: &Value) -> Result<Polygon, GeometryError> {
    let rings = value
        .as_array()
        .ok_or_else(|| GeometryError::Invalid("polygon rings must be an array".to_string()))?;
    let mut rings = rings.iter().map(ring_from);
    let exterior = rings.next().transpose()?.unwrap_or_default();
    let holes = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon { exterior, holes })
}

fn ring_from(value: &Value) -> Result<Vec<Point>, GeometryError> {
    let positions = value
        .as_array()
        .ok_or_else(|| GeometryError::Invalid("ring must be an array".to_string()))?;
    positions
        .iter()
        .map(|pos| {
            let xy = pos.as_array().filter(|a| a.len() >= 2);
            match xy.map(|a| (a[0].as_f64(), a[1].as_f64())) {
                Some((Some(x), Some(y))) => Ok(Point::new(x, y)),
                _ => Err(GeometryError::Invalid(format!("bad position {pos}"))),
            }
        })
        .collect()
}
