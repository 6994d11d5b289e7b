//! Jurisdiction registry: static configuration for both resolvers.
//!
//! The registry is loaded once (from the built-in table or a JSON file),
//! validated, and then shared read-only. Delegated jurisdictions (e.g.
//! census-designated places) carry no strategies or districts of their own;
//! they resolve to their zoning authority.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{AcquisitionStrategy, RegistryError, RegistryResult};
use crate::use_codes::UseCategory;

/// Built-in region configuration, embedded at compile time.
const BUILTIN_JSON: &str = include_str!("jurisdictions.json");

/// A zoning district known to a jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A governing body whose ordinances define zoning for its area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub id: String,
    pub name: String,
    /// Delegate zoning authority; `None` means the jurisdiction is its own authority.
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub strategies: Vec<AcquisitionStrategy>,
    #[serde(default)]
    pub districts: Vec<District>,
    #[serde(default)]
    pub baseline_district: Option<String>,
    #[serde(default)]
    pub use_code_defaults: BTreeMap<UseCategory, String>,
}

impl Jurisdiction {
    pub fn is_delegated(&self) -> bool {
        self.authority.is_some()
    }

    /// Find a known district by code, tolerant of case, spacing and dash style.
    pub fn find_district(&self, code: &str) -> Option<&District> {
        let wanted = compact_code(code);
        if wanted.is_empty() {
            return None;
        }
        self.districts
            .iter()
            .find(|d| compact_code(&d.code) == wanted)
    }

    pub fn knows_district(&self, code: &str) -> bool {
        self.find_district(code).is_some()
    }

    /// District codes ordered longest first, so "R-1AA" is tried before "R-1".
    pub fn codes_longest_first(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.districts.iter().map(|d| d.code.as_str()).collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        codes
    }

    /// Representative district for a land-use category, if configured.
    pub fn default_for(&self, category: UseCategory) -> Option<&str> {
        self.use_code_defaults.get(&category).map(String::as_str)
    }
}

/// Canonical display form of a district code: uppercase, ASCII dashes, no spaces.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            other => other,
        })
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Comparison key for district codes: normalized with dashes removed.
fn compact_code(code: &str) -> String {
    normalize_code(code).replace('-', "")
}

#[derive(Deserialize)]
struct RegistryFile {
    jurisdictions: Vec<Jurisdiction>,
}

/// Immutable, validated set of jurisdictions.
#[derive(Debug, Clone)]
pub struct JurisdictionRegistry {
    jurisdictions: BTreeMap<String, Jurisdiction>,
}

impl JurisdictionRegistry {
    /// The region table compiled into the crate.
    pub fn builtin() -> RegistryResult<Self> {
        Self::from_json(BUILTIN_JSON)
    }

    /// Load a registry from a JSON file.
    pub fn from_file(path: &Path) -> RegistryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a registry from JSON text.
    pub fn from_json(content: &str) -> RegistryResult<Self> {
        let file: RegistryFile = serde_json::from_str(content)?;
        Self::from_jurisdictions(file.jurisdictions)
    }

    /// Build a registry from already-constructed jurisdictions.
    pub fn from_jurisdictions(list: Vec<Jurisdiction>) -> RegistryResult<Self> {
        let mut jurisdictions = BTreeMap::new();
        for j in list {
            if jurisdictions.contains_key(&j.id) {
                return Err(RegistryError::Duplicate(j.id));
            }
            jurisdictions.insert(j.id.clone(), j);
        }
        let registry = Self { jurisdictions };
        registry.validate()?;
        tracing::debug!("jurisdiction registry loaded: {} entries", registry.len());
        Ok(registry)
    }

    fn validate(&self) -> RegistryResult<()> {
        for j in self.jurisdictions.values() {
            if let Some(authority) = &j.authority {
                if !self.jurisdictions.contains_key(authority) {
                    return Err(RegistryError::UnknownAuthority {
                        jurisdiction: j.id.clone(),
                        authority: authority.clone(),
                    });
                }
                // Walk the chain once to reject cycles up front.
                self.authority_of(&j.id)?;
                continue;
            }

            if j.strategies.is_empty() {
                return Err(RegistryError::NoStrategies(j.id.clone()));
            }
            let named = j
                .baseline_district
                .iter()
                .chain(j.use_code_defaults.values());
            for code in named {
                if !j.knows_district(code) {
                    return Err(RegistryError::UnknownDistrict {
                        jurisdiction: j.id.clone(),
                        district: code.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Jurisdiction> {
        self.jurisdictions.get(id)
    }

    /// Look up a jurisdiction, failing with `NotFound`.
    pub fn require(&self, id: &str) -> RegistryResult<&Jurisdiction> {
        self.get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Follow delegation to the jurisdiction that owns zoning for `id`.
    pub fn authority_of(&self, id: &str) -> RegistryResult<&Jurisdiction> {
        let mut seen = HashSet::new();
        let mut current = self.require(id)?;
        while let Some(next) = &current.authority {
            if !seen.insert(current.id.as_str()) {
                return Err(RegistryError::DelegationCycle(current.id.clone()));
            }
            current = self.require(next)?;
        }
        Ok(current)
    }

    /// Jurisdictions that own their zoning (the acquisition targets).
    pub fn authorities(&self) -> impl Iterator<Item = &Jurisdiction> {
        self.jurisdictions.values().filter(|j| !j.is_delegated())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Jurisdiction> {
        self.jurisdictions.values()
    }

    pub fn len(&self) -> usize {
        self.jurisdictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jurisdictions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_loads() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        assert!(registry.len() >= 4);
        let oc = registry.get("orange-county-fl").unwrap();
        assert!(!oc.is_delegated());
        assert!(oc.knows_district("R-1AA"));
        assert!(!oc.strategies.is_empty());
    }

    #[test]
    fn test_cdp_delegates_to_county() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let authority = registry.authority_of("pine-hills-fl").unwrap();
        assert_eq!(authority.id, "orange-county-fl");
        // A self-governing city is its own authority.
        let wp = registry.authority_of("winter-park-fl").unwrap();
        assert_eq!(wp.id, "winter-park-fl");
        assert!(registry.authorities().all(|j| !j.is_delegated()));
    }

    #[test]
    fn test_district_lookup_is_lenient() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let oc = registry.get("orange-county-fl").unwrap();
        assert!(oc.knows_district("r-1aa"));
        assert!(oc.knows_district("R1AA"));
        assert!(oc.knows_district("R\u{2013}1AA"));
        assert!(!oc.knows_district("R-9"));
        assert!(!oc.knows_district(""));
    }

    #[test]
    fn test_codes_longest_first() {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let codes = registry.get("orange-county-fl").unwrap().codes_longest_first();
        let pos_long = codes.iter().position(|c| *c == "R-1AA").unwrap();
        let pos_short = codes.iter().position(|c| *c == "R-1").unwrap();
        assert!(pos_long < pos_short);
    }

    #[test]
    fn test_unknown_authority_rejected() {
        let json = r#"{"jurisdictions": [
            {"id": "cdp", "name": "Somewhere CDP", "authority": "missing-county"}
        ]}"#;
        let err = JurisdictionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAuthority { .. }));
    }

    #[test]
    fn test_delegation_cycle_rejected() {
        let json = r#"{"jurisdictions": [
            {"id": "a", "name": "A", "authority": "b"},
            {"id": "b", "name": "B", "authority": "a"}
        ]}"#;
        let err = JurisdictionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::DelegationCycle(_)));
    }

    #[test]
    fn test_authority_without_strategies_rejected() {
        let json = r#"{"jurisdictions": [
            {"id": "town", "name": "Town", "districts": [{"code": "R-1"}]}
        ]}"#;
        let err = JurisdictionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::NoStrategies(_)));
    }

    #[test]
    fn test_unknown_baseline_rejected() {
        let json = r#"{"jurisdictions": [
            {"id": "town", "name": "Town",
             "strategies": [{"kind": "stale_cache"}],
             "districts": [{"code": "R-1"}],
             "baseline_district": "R-9"}
        ]}"#;
        let err = JurisdictionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDistrict { .. }));
    }

    #[test]
    fn test_duplicate_rejected() {
        let json = r#"{"jurisdictions": [
            {"id": "a", "name": "A", "strategies": [{"kind": "stale_cache"}]},
            {"id": "a", "name": "A again", "strategies": [{"kind": "stale_cache"}]}
        ]}"#;
        let err = JurisdictionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, BUILTIN_JSON).unwrap();
        let registry = JurisdictionRegistry::from_file(&path).unwrap();
        assert!(registry.require("winter-park-fl").is_ok());
        assert!(matches!(
            registry.require("nowhere"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" r-1 aa "), "R-1AA");
        assert_eq!(normalize_code("C\u{2014}2"), "C-2");
    }
}
