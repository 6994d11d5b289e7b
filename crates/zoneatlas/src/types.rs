//! Core data types shared by the acquisition, canonicalization, and spatial layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an acquisition provider should fetch a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Plain HTTP GET, no script execution.
    Static,
    /// Headless-browser render, waiting for client-side content.
    Rendered,
}

/// Which backend performs a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Direct HTTP client.
    Http,
    /// Local headless Chromium.
    Browser,
    /// Hosted render/unblock service reached over HTTP with an API key.
    RenderService,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
            Self::RenderService => "render_service",
        }
    }
}

/// One rung of a jurisdiction's acquisition ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionStrategy {
    /// Fetch through a provider with the given wait/timeout policy.
    Fetch {
        provider: ProviderKind,
        render: RenderMode,
        #[serde(default)]
        wait_ms: u64,
        timeout_ms: u64,
        /// Override of the validator's length floor for this source.
        #[serde(default)]
        min_length: Option<usize>,
    },
    /// Fall back to an expired cache entry, if one exists.
    StaleCache,
}

impl AcquisitionStrategy {
    /// Short label used in logs and attempt records.
    pub fn label(&self) -> String {
        match self {
            Self::Fetch {
                provider,
                render,
                wait_ms,
                ..
            } => match render {
                RenderMode::Static => format!("{}:static", provider.as_str()),
                RenderMode::Rendered => format!("{}:rendered+{wait_ms}ms", provider.as_str()),
            },
            Self::StaleCache => "stale_cache".to_string(),
        }
    }
}

/// Classification of a raw acquisition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Usable,
    Blocked,
    Empty,
}

/// Outcome of a single acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Usable,
    Blocked,
    Empty,
    /// Transport error or timeout.
    Error,
}

impl From<ResponseStatus> for AttemptOutcome {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Usable => Self::Usable,
            ResponseStatus::Blocked => Self::Blocked,
            ResponseStatus::Empty => Self::Empty,
        }
    }
}

/// Citation attached to every extracted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub url: String,
    pub retrieved_at: DateTime<Utc>,
}

/// Dimensional standards of one zoning district.
///
/// Every numeric field is canonical: a single value in the unit named by the
/// field, or `None` when the source gave no value. Zero is a real value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalStandard {
    pub jurisdiction_id: String,
    pub district_code: String,
    pub district_name: Option<String>,
    pub min_lot_area_sqft: Option<u64>,
    pub min_lot_width_ft: Option<f64>,
    pub min_lot_depth_ft: Option<f64>,
    pub max_height_ft: Option<f64>,
    pub max_stories: Option<u32>,
    pub front_setback_ft: Option<f64>,
    pub side_setback_ft: Option<f64>,
    pub side_corner_setback_ft: Option<f64>,
    pub rear_setback_ft: Option<f64>,
    pub max_lot_coverage_pct: Option<f64>,
    pub max_impervious_pct: Option<f64>,
    pub source: SourceCitation,
}

impl DimensionalStandard {
    /// An empty record for a district; all fields unknown.
    pub fn empty(jurisdiction_id: &str, district_code: &str, source: SourceCitation) -> Self {
        Self {
            jurisdiction_id: jurisdiction_id.to_string(),
            district_code: district_code.to_string(),
            district_name: None,
            min_lot_area_sqft: None,
            min_lot_width_ft: None,
            min_lot_depth_ft: None,
            max_height_ft: None,
            max_stories: None,
            front_setback_ft: None,
            side_setback_ft: None,
            side_corner_setback_ft: None,
            rear_setback_ft: None,
            max_lot_coverage_pct: None,
            max_impervious_pct: None,
            source,
        }
    }

    /// Number of numeric fields with a value.
    pub fn populated_fields(&self) -> usize {
        [
            self.min_lot_area_sqft.is_some(),
            self.min_lot_width_ft.is_some(),
            self.min_lot_depth_ft.is_some(),
            self.max_height_ft.is_some(),
            self.max_stories.is_some(),
            self.front_setback_ft.is_some(),
            self.side_setback_ft.is_some(),
            self.side_corner_setback_ft.is_some(),
            self.rear_setback_ft.is_some(),
            self.max_lot_coverage_pct.is_some(),
            self.max_impervious_pct.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Reliability of a spatial assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// The spatial resolver method that produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Centroid,
    BboxCenter,
    BboxOffset25,
    BboxOffset75,
    Envelope,
    BufferedEnvelope,
    UseCode,
    Baseline,
}

impl ResolutionMethod {
    /// Stable tag persisted alongside every assignment.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Centroid => "centroid",
            Self::BboxCenter => "bbox_center",
            Self::BboxOffset25 => "bbox_offset_25",
            Self::BboxOffset75 => "bbox_offset_75",
            Self::Envelope => "envelope",
            Self::BufferedEnvelope => "buffered_envelope",
            Self::UseCode => "use_code",
            Self::Baseline => "baseline",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "centroid" => Self::Centroid,
            "bbox_center" => Self::BboxCenter,
            "bbox_offset_25" => Self::BboxOffset25,
            "bbox_offset_75" => Self::BboxOffset75,
            "envelope" => Self::Envelope,
            "buffered_envelope" => Self::BufferedEnvelope,
            "use_code" => Self::UseCode,
            "baseline" => Self::Baseline,
            _ => return None,
        })
    }
}

/// The zoning district resolved for one parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelZoningAssignment {
    pub parcel_id: String,
    pub jurisdiction_id: String,
    pub district_code: String,
    pub confidence: ConfidenceTier,
    pub method: ResolutionMethod,
    pub resolved_at: DateTime<Utc>,
}

/// Errors raised while turning source fragments into standards.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CanonicalizeError {
    #[error("malformed fragment for {jurisdiction}: {reason}")]
    MalformedFragment {
        jurisdiction: String,
        reason: String,
    },
}

/// Errors raised while loading or validating the jurisdiction registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("registry parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate jurisdiction id: {0}")]
    Duplicate(String),

    #[error("jurisdiction {jurisdiction} delegates to unknown authority {authority}")]
    UnknownAuthority {
        jurisdiction: String,
        authority: String,
    },

    #[error("delegation cycle through {0}")]
    DelegationCycle(String),

    #[error("jurisdiction {0} has no acquisition strategies")]
    NoStrategies(String),

    #[error("jurisdiction {jurisdiction} names unknown district {district}")]
    UnknownDistrict {
        jurisdiction: String,
        district: String,
    },

    #[error("jurisdiction not found: {0}")]
    NotFound(String),
}

/// Errors raised while loading geometry sources.
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("GeoJSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GeoJSON: {0}")]
    Invalid(String),
}

/// Convenience result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tags_roundtrip() {
        let methods = [
            ResolutionMethod::Centroid,
            ResolutionMethod::BboxCenter,
            ResolutionMethod::BboxOffset25,
            ResolutionMethod::BboxOffset75,
            ResolutionMethod::Envelope,
            ResolutionMethod::BufferedEnvelope,
            ResolutionMethod::UseCode,
            ResolutionMethod::Baseline,
        ];
        for m in methods {
            assert_eq!(ResolutionMethod::from_tag(m.tag()), Some(m));
        }
        assert_eq!(ResolutionMethod::from_tag("nearest"), None);
    }

    #[test]
    fn test_strategy_labels() {
        let s = AcquisitionStrategy::Fetch {
            provider: ProviderKind::RenderService,
            render: RenderMode::Rendered,
            wait_ms: 5000,
            timeout_ms: 60000,
            min_length: None,
        };
        assert_eq!(s.label(), "render_service:rendered+5000ms");
        assert_eq!(AcquisitionStrategy::StaleCache.label(), "stale_cache");
    }

    #[test]
    fn test_strategy_deserializes_from_config() {
        let json = r#"[
            {"kind": "fetch", "provider": "http", "render": "static", "timeout_ms": 15000},
            {"kind": "stale_cache"}
        ]"#;
        let parsed: Vec<AcquisitionStrategy> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 2);
        match &parsed[0] {
            AcquisitionStrategy::Fetch {
                wait_ms,
                min_length,
                ..
            } => {
                assert_eq!(*wait_ms, 0);
                assert!(min_length.is_none());
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceTier::High > ConfidenceTier::Medium);
        assert!(ConfidenceTier::Medium > ConfidenceTier::Low);
        assert_eq!(
            serde_json::to_string(&ConfidenceTier::High).unwrap(),
            "\"HIGH\""
        );
    }
}
