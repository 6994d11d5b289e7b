//! ZoneAtlas: zoning standards extraction and parcel zoning resolution.

pub mod canonicalize;
pub mod chain;
pub mod fragments;
pub mod geometry;
pub mod index;
pub mod registry;
pub mod spatial;
pub mod types;
pub mod use_codes;
pub mod validator;

pub use canonicalize::{merge_missing, Canonicalizer, FragmentBody, RawFragment};
pub use chain::{first_success, first_success_async, ChainHit};
pub use fragments::{extract_standards, DistrictFragment, Extraction};
pub use geometry::{Envelope, ParcelGeometry, Point, Polygon};
pub use index::{PolygonIndex, ZoningIndex};
pub use registry::{Jurisdiction, JurisdictionRegistry};
pub use spatial::{Parcel, SpatialResolver, DEFAULT_BUFFER_FT};
pub use types::*;
pub use use_codes::UseCategory;
pub use validator::{inspect, validate, Validation, DEFAULT_MIN_LENGTH};
