//! Canonicalization of ordinance fragments into typed dimensional standards.
//!
//! A fragment is split into clauses ("25 ft front", "Minimum lot area: 12,000",
//! "max height 36 ft"). Each clause is matched against an ordered table of
//! field keywords, and the first real numeral in the clause whose unit
//! suits the field becomes the field's value.
//!
//! # Numeral rules
//!
//! - Grouping separators are stripped (`12,000` → 12000).
//! - Only the first numeral counts: alternates (`50/65`), sub-use qualifiers
//!   (`20 or 30(MF)`) and trailing footnote numbers are discarded.
//! - Superscript footnotes never match, and digits glued to letters or
//!   dashes (district codes such as `R-1`) are skipped.
//! - Cross-reference numbers (`section 38-79`, `Table 3`, `note 2`) are
//!   skipped.
//! - A numeral with the wrong unit for the field (`2 stories` for height)
//!   is passed over; unit-less numerals are accepted.
//! - Integer-only fields truncate toward zero; all others keep fractions.
//! - A field with no numeral stays `None`. Zero is a legitimate value.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::registry::{normalize_code, Jurisdiction};
use crate::types::{CanonicalizeError, DimensionalStandard, SourceCitation};

/// Square feet per acre.
const SQFT_PER_ACRE: f64 = 43_560.0;

/// Body of a source fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum FragmentBody {
    /// Plain text (narrative, or table rows already flattened to `label: value` lines).
    Text(String),
    /// An HTML snippet (a table or a section of a code page).
    Html(String),
}

/// A piece of ordinance text believed to describe one district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    pub body: FragmentBody,
    pub source: SourceCitation,
}

impl RawFragment {
    pub fn text(content: impl Into<String>, source: SourceCitation) -> Self {
        Self {
            body: FragmentBody::Text(content.into()),
            source,
        }
    }

    pub fn html(content: impl Into<String>, source: SourceCitation) -> Self {
        Self {
            body: FragmentBody::Html(content.into()),
            source,
        }
    }

    /// Flattened text of the fragment, with footnote superscripts removed.
    pub fn plain_text(&self) -> String {
        match &self.body {
            FragmentBody::Text(t) => t.clone(),
            FragmentBody::Html(h) => crate::fragments::html_to_text(h),
        }
    }
}

/// Unit attached to a numeral in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Feet,
    SquareFeet,
    Acres,
    Percent,
    Stories,
    None,
}

/// A numeral read out of a clause together with its unit suffix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

/// Dimensional fields a clause can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    LotArea,
    LotWidth,
    LotDepth,
    Height,
    Stories,
    Front,
    Side,
    SideCorner,
    Rear,
    Coverage,
    Impervious,
}

impl Field {
    /// Whether a numeral carrying `unit` can be this field's value.
    fn accepts(self, unit: Unit) -> bool {
        if unit == Unit::None {
            return true;
        }
        match self {
            Field::LotArea => matches!(unit, Unit::SquareFeet | Unit::Acres),
            Field::Stories => unit == Unit::Stories,
            Field::Coverage | Field::Impervious => unit == Unit::Percent,
            Field::LotWidth
            | Field::LotDepth
            | Field::Height
            | Field::Front
            | Field::Side
            | Field::SideCorner
            | Field::Rear => unit == Unit::Feet,
        }
    }
}

/// Ordered keyword table. Order matters: "side corner" before "side",
/// "frontage" (width) before "front", "impervious" before "coverage",
/// "height" before "stories".
const FIELD_PATTERNS: &[(Field, &str)] = &[
    (Field::SideCorner, r"side[\s-]*corner|corner[\s-]*(?:side|lot|yard)|street[\s-]*side"),
    (Field::LotWidth, r"lot\s+width|width\s+of\s+lot|frontage|\bwidth\b"),
    (Field::LotDepth, r"lot\s+depth|depth\s+of\s+lot|\bdepth\b"),
    (Field::Front, r"\bfront\b"),
    (Field::Side, r"\bsides?\b"),
    (Field::Rear, r"\brear\b"),
    (Field::Impervious, r"impervious"),
    (Field::Coverage, r"coverage"),
    (Field::Height, r"height"),
    (Field::Stories, r"\bstor(?:y|ies|eys?)\b"),
    (
        Field::LotArea,
        r"lot\s+area|lot\s+size|area\s+of\s+lot|sq\.?\s*ft|sqft|square\s+f(?:ee|oo)t|\bsf\b|\bacres?\b",
    ),
];

/// Clauses mentioning these areas are building metrics, not lot area.
const NOT_LOT_AREA: &str = r"floor\s+area|living\s+area|dwelling\s+(?:unit\s+)?size|building\s+area";

fn field_regexes() -> &'static Vec<(Field, Regex)> {
    static RE: OnceLock<Vec<(Field, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        FIELD_PATTERNS
            .iter()
            .map(|(field, pattern)| {
                let re = Regex::new(&format!("(?i){pattern}")).expect("field regex is valid");
                (*field, re)
            })
            .collect()
    })
}

fn not_lot_area_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(?i){NOT_LOT_AREA}")).expect("lot area regex is valid"))
}

fn numeral_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?|\.[0-9]+").expect("numeral regex is valid"))
}

/// Words whose following number is a citation, not a measurement.
fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\b(?:secs?|sections?|tables?|chapters?|ch|articles?|art|footnotes?|notes?|figures?|fig|subsections?)\.?|§+)\s*$",
        )
        .expect("reference regex is valid")
    })
}

fn grouped_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?$").expect("grouping regex is valid"))
}

/// Read the numeric magnitude of a numeral token.
///
/// `12,000` is a grouped integer; `20,30` is a list and yields `20`.
pub fn parse_numeral(token: &str) -> Option<f64> {
    let token = token.trim().trim_end_matches(',');
    if token.is_empty() {
        return None;
    }
    let cleaned = if grouped_re().is_match(token) {
        token.replace(',', "")
    } else {
        token.split(',').next().unwrap_or_default().to_string()
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Return the first real quantity in `text`.
///
/// Numerals glued to a preceding letter, dash or section sign (district
/// codes, section numbers), numerals cited after words such as "section"
/// or "table", and numerals that fail to parse are skipped.
pub fn first_quantity(text: &str) -> Option<Quantity> {
    quantities(text).into_iter().next()
}

fn quantities(text: &str) -> Vec<Quantity> {
    numeral_re()
        .find_iter(text)
        .filter(|m| {
            let prefix = &text[..m.start()];
            let before = prefix.chars().next_back();
            !matches!(before, Some(c) if c.is_alphabetic() || c == '-' || c == '_' || c == '§')
                && !reference_re().is_match(prefix)
        })
        .filter_map(|m| {
            let value = parse_numeral(m.as_str())?;
            Some(Quantity {
                value,
                unit: unit_after(&text[m.end()..]),
            })
        })
        .collect()
}

/// Identify the unit suffix immediately following a numeral.
fn unit_after(rest: &str) -> Unit {
    let rest = rest.trim_start();
    let lower: String = rest.chars().take(16).collect::<String>().to_lowercase();
    let word = |w: &str| {
        lower.starts_with(w)
            && !lower[w.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
    };

    if lower.starts_with('%') || lower.starts_with("percent") {
        Unit::Percent
    } else if lower.starts_with("acre") || word("ac") {
        Unit::Acres
    } else if lower.starts_with("sq") || lower.starts_with("square") || word("sf") {
        Unit::SquareFeet
    } else if lower.starts_with("stor") {
        Unit::Stories
    } else if word("ft") || lower.starts_with("feet") || lower.starts_with("foot") {
        Unit::Feet
    } else if rest.starts_with('\'') || rest.starts_with('\u{2019}') || rest.starts_with('\u{2032}') {
        Unit::Feet
    } else {
        Unit::None
    }
}

/// Split fragment text into clauses.
///
/// Breaks on newlines, semicolons, pipes, ellipses, commas followed by
/// whitespace (so `10,000` stays whole) and sentence ends.
pub fn split_clauses(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    let flush = |current: &mut String, clauses: &mut Vec<String>| {
        let clause = current.trim();
        if !clause.is_empty() {
            clauses.push(clause.to_string());
        }
        current.clear();
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' | '\r' | ';' | '|' | '\u{2026}' => flush(&mut current, &mut clauses),
            '.' if next == Some('.') => {
                while chars.get(i + 1) == Some(&'.') {
                    i += 1;
                }
                flush(&mut current, &mut clauses);
            }
            ',' if next.is_some_and(char::is_whitespace) => flush(&mut current, &mut clauses),
            '.' if next.is_some_and(char::is_whitespace)
                && chars
                    .get(i + 2)
                    .is_some_and(|n| n.is_uppercase())
                && !current.trim_end().to_lowercase().ends_with("sq")
                && !current.trim_end().to_lowercase().ends_with("ft") =>
            {
                flush(&mut current, &mut clauses)
            }
            _ => current.push(c),
        }
        i += 1;
    }
    flush(&mut current, &mut clauses);
    clauses
}

fn detect_field(clause: &str) -> Option<Field> {
    field_regexes()
        .iter()
        .find(|(field, re)| {
            re.is_match(clause) && !(*field == Field::LotArea && not_lot_area_re().is_match(clause))
        })
        .map(|(field, _)| *field)
}

/// The portion of a clause that carries its value: text after the first
/// colon for `label: value` rows, otherwise the whole clause.
fn value_segment(clause: &str) -> &str {
    match clause.find(':') {
        Some(idx) if !clause[idx + 1..].trim().is_empty() => &clause[idx + 1..],
        _ => clause,
    }
}

fn truncate_u64(value: f64) -> Option<u64> {
    (value >= 0.0).then(|| value.trunc() as u64)
}

fn truncate_u32(value: f64) -> Option<u32> {
    (value >= 0.0 && value <= u32::MAX as f64).then(|| value.trunc() as u32)
}

/// Apply one clause to a record. Fields already set are not overwritten.
fn apply_clause(record: &mut DimensionalStandard, clause: &str) {
    let Some(field) = detect_field(clause) else {
        return;
    };
    let segment = value_segment(clause);
    let found = quantities(segment);

    // A "2.5 stories" anywhere in a clause feeds the stories field.
    if record.max_stories.is_none() {
        if let Some(q) = found.iter().find(|q| q.unit == Unit::Stories) {
            record.max_stories = truncate_u32(q.value);
        }
    }

    let Some(q) = found.iter().find(|q| field.accepts(q.unit)).copied() else {
        return;
    };

    match field {
        Field::LotArea => {
            if record.min_lot_area_sqft.is_none() {
                let sqft = match q.unit {
                    Unit::Acres => q.value * SQFT_PER_ACRE,
                    _ => q.value,
                };
                record.min_lot_area_sqft = truncate_u64(sqft);
            }
        }
        Field::LotWidth => set_once(&mut record.min_lot_width_ft, q.value),
        Field::LotDepth => set_once(&mut record.min_lot_depth_ft, q.value),
        Field::Height => set_once(&mut record.max_height_ft, q.value),
        Field::Stories => {
            if record.max_stories.is_none() {
                record.max_stories = truncate_u32(q.value);
            }
        }
        Field::Front => set_once(&mut record.front_setback_ft, q.value),
        Field::Side => set_once(&mut record.side_setback_ft, q.value),
        Field::SideCorner => set_once(&mut record.side_corner_setback_ft, q.value),
        Field::Rear => set_once(&mut record.rear_setback_ft, q.value),
        Field::Coverage => set_once(&mut record.max_lot_coverage_pct, q.value),
        Field::Impervious => set_once(&mut record.max_impervious_pct, q.value),
    }
}

fn set_once(slot: &mut Option<f64>, value: f64) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Find the known district code a piece of text refers to.
///
/// Codes are tried longest first and must stand as a whole token, so
/// "R-1AA" is never read as "R-1".
pub fn detect_district<'a>(text: &str, authority: &'a Jurisdiction) -> Option<&'a str> {
    let upper = normalize_dashes(text).to_uppercase();
    authority.codes_longest_first().into_iter().find(|code| {
        let code_upper = code.to_uppercase();
        upper.match_indices(&code_upper).any(|(idx, _)| {
            let before = upper[..idx].chars().next_back();
            let after = upper[idx + code_upper.len()..].chars().next();
            let boundary = |c: Option<char>| !matches!(c, Some(ch) if ch.is_alphanumeric() || ch == '-');
            boundary(before) && boundary(after)
        })
    })
}

fn normalize_dashes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            other => other,
        })
        .collect()
}

/// Turns fragments into [`DimensionalStandard`] records for one zoning authority.
pub struct Canonicalizer<'a> {
    authority: &'a Jurisdiction,
}

impl<'a> Canonicalizer<'a> {
    /// `authority` must be the jurisdiction that owns zoning (after delegation).
    pub fn new(authority: &'a Jurisdiction) -> Self {
        Self { authority }
    }

    /// Canonicalize a fragment known to describe `district_code`.
    ///
    /// Fails with `MalformedFragment` when the code is not a district of the
    /// authority; the fragment is never folded into another district.
    pub fn canonicalize(
        &self,
        fragment: &RawFragment,
        district_code: &str,
    ) -> Result<DimensionalStandard, CanonicalizeError> {
        let district = self.authority.find_district(district_code).ok_or_else(|| {
            CanonicalizeError::MalformedFragment {
                jurisdiction: self.authority.id.clone(),
                reason: format!("unknown district code {:?}", normalize_code(district_code)),
            }
        })?;

        let mut record =
            DimensionalStandard::empty(&self.authority.id, &district.code, fragment.source.clone());
        record.district_name = district.name.clone();

        for clause in split_clauses(&fragment.plain_text()) {
            apply_clause(&mut record, &clause);
        }

        tracing::debug!(
            jurisdiction = %self.authority.id,
            district = %district.code,
            fields = record.populated_fields(),
            "canonicalized fragment"
        );
        Ok(record)
    }

    /// Canonicalize a fragment whose district must be read from its own text.
    pub fn canonicalize_detected(
        &self,
        fragment: &RawFragment,
    ) -> Result<DimensionalStandard, CanonicalizeError> {
        let text = fragment.plain_text();
        let code = detect_district(&text, self.authority).ok_or_else(|| {
            CanonicalizeError::MalformedFragment {
                jurisdiction: self.authority.id.clone(),
                reason: "no known district code in fragment".to_string(),
            }
        })?;
        self.canonicalize(fragment, code)
    }
}

/// Fill fields missing from `primary` with values from `secondary`.
///
/// Both records must describe the same district; `primary` keeps its citation.
pub fn merge_missing(primary: &mut DimensionalStandard, secondary: &DimensionalStandard) {
    fn fill<T: Copy>(slot: &mut Option<T>, other: Option<T>) {
        if slot.is_none() {
            *slot = other;
        }
    }
    if primary.district_name.is_none() {
        primary.district_name = secondary.district_name.clone();
    }
    fill(&mut primary.min_lot_area_sqft, secondary.min_lot_area_sqft);
    fill(&mut primary.min_lot_width_ft, secondary.min_lot_width_ft);
    fill(&mut primary.min_lot_depth_ft, secondary.min_lot_depth_ft);
    fill(&mut primary.max_height_ft, secondary.max_height_ft);
    fill(&mut primary.max_stories, secondary.max_stories);
    fill(&mut primary.front_setback_ft, secondary.front_setback_ft);
    fill(&mut primary.side_setback_ft, secondary.side_setback_ft);
    fill(&mut primary.side_corner_setback_ft, secondary.side_corner_setback_ft);
    fill(&mut primary.rear_setback_ft, secondary.rear_setback_ft);
    fill(&mut primary.max_lot_coverage_pct, secondary.max_lot_coverage_pct);
    fill(&mut primary.max_impervious_pct, secondary.max_impervious_pct);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JurisdictionRegistry;
    use chrono::Utc;

    fn citation() -> SourceCitation {
        SourceCitation {
            url: "https://library.example.gov/code".to_string(),
            retrieved_at: Utc::now(),
        }
    }

    fn with_county<T>(f: impl FnOnce(&Canonicalizer<'_>) -> T) -> T {
        let registry = JurisdictionRegistry::builtin().unwrap();
        let county = registry.get("orange-county-fl").unwrap();
        f(&Canonicalizer::new(county))
    }

    fn canon(text: &str, code: &str) -> DimensionalStandard {
        with_county(|c| c.canonicalize(&RawFragment::text(text, citation()), code).unwrap())
    }

    #[test]
    fn test_thousands_separator() {
        assert_eq!(parse_numeral("12,000"), Some(12000.0));
        assert_eq!(parse_numeral("1,250,000"), Some(1_250_000.0));
        let s = canon("Minimum lot area: 12,000", "R-1");
        assert_eq!(s.min_lot_area_sqft, Some(12000));
    }

    #[test]
    fn test_multi_value_cell_takes_primary() {
        let s = canon("Front setback: 20 or 30(MF)", "R-3");
        assert_eq!(s.front_setback_ft, Some(20.0));
    }

    #[test]
    fn test_slash_alternate_with_footnote() {
        let s = canon("Max height: 50/65\u{00B2}", "C-2");
        assert_eq!(s.max_height_ft, Some(50.0));
        let s = canon("Maximum building height: 50/65*", "C-2");
        assert_eq!(s.max_height_ft, Some(50.0));
    }

    #[test]
    fn test_trailing_footnote_not_merged() {
        let s = canon("Rear yard: 25 3", "R-1");
        assert_eq!(s.rear_setback_ft, Some(25.0));
        let s = canon("Rear yard: 25\u{00B9}\u{00B2}", "R-1");
        assert_eq!(s.rear_setback_ft, Some(25.0));
    }

    #[test]
    fn test_fraction_on_integer_and_fractional_fields() {
        let s = canon("Maximum stories: 7.5\nSide setback: 7.5 ft", "R-1");
        assert_eq!(s.max_stories, Some(7));
        assert_eq!(s.side_setback_ft, Some(7.5));
    }

    #[test]
    fn test_missing_value_is_null_not_zero() {
        let s = canon("Front setback: 25 ft\nSide setback: N/A\nRear setback: \u{2014}", "R-1");
        assert_eq!(s.front_setback_ft, Some(25.0));
        assert_eq!(s.side_setback_ft, None);
        assert_eq!(s.rear_setback_ft, None);
        assert_eq!(s.max_height_ft, None);
    }

    #[test]
    fn test_explicit_zero_is_kept() {
        let s = canon("Side setback: 0 ft", "C-1");
        assert_eq!(s.side_setback_ft, Some(0.0));
    }

    #[test]
    fn test_end_to_end_narrative() {
        let text = "R-1AA ... 10,000 sqft lot ... 25 ft front, 10 ft side, 25 ft side-corner, \
                    25 ft rear, max height 36 ft";
        let s = canon(text, "R-1AA");
        assert_eq!(s.district_code, "R-1AA");
        assert_eq!(s.min_lot_area_sqft, Some(10000));
        assert_eq!(s.front_setback_ft, Some(25.0));
        assert_eq!(s.side_setback_ft, Some(10.0));
        assert_eq!(s.side_corner_setback_ft, Some(25.0));
        assert_eq!(s.rear_setback_ft, Some(25.0));
        assert_eq!(s.max_height_ft, Some(36.0));
        assert_eq!(s.max_lot_coverage_pct, None);
    }

    #[test]
    fn test_detected_district_prefers_longest_code() {
        let text = "R-1AA ... 10,000 sqft lot ... 25 ft front";
        let s = with_county(|c| {
            c.canonicalize_detected(&RawFragment::text(text, citation()))
                .unwrap()
        });
        assert_eq!(s.district_code, "R-1AA");
        assert_eq!(s.district_name.as_deref(), Some("Single-Family Dwelling District"));
    }

    #[test]
    fn test_unknown_district_is_malformed() {
        let err = with_county(|c| {
            c.canonicalize(&RawFragment::text("25 ft front", citation()), "R-9Z")
                .unwrap_err()
        });
        assert!(matches!(err, CanonicalizeError::MalformedFragment { .. }));

        let err = with_county(|c| {
            c.canonicalize_detected(&RawFragment::text("Zone X-7: 25 ft front", citation()))
                .unwrap_err()
        });
        assert!(matches!(err, CanonicalizeError::MalformedFragment { .. }));
    }

    #[test]
    fn test_units_and_percentages() {
        let text = "Minimum lot size: 0.5 acres\nMaximum lot coverage: 40%\n\
                    Maximum impervious surface coverage: 65 percent\nLot width: 85'\n\
                    Lot depth: 110 feet";
        let s = canon(text, "R-CE");
        assert_eq!(s.min_lot_area_sqft, Some(21780));
        assert_eq!(s.max_lot_coverage_pct, Some(40.0));
        assert_eq!(s.max_impervious_pct, Some(65.0));
        assert_eq!(s.min_lot_width_ft, Some(85.0));
        assert_eq!(s.min_lot_depth_ft, Some(110.0));
    }

    #[test]
    fn test_height_with_stories() {
        let s = canon("Maximum height: 35 ft or 2.5 stories", "R-2");
        assert_eq!(s.max_height_ft, Some(35.0));
        assert_eq!(s.max_stories, Some(2));
    }

    #[test]
    fn test_height_stories_first_then_feet() {
        let s = canon("Maximum height: 2 stories or 35 ft", "R-1AA");
        assert_eq!(s.max_height_ft, Some(35.0));
        assert_eq!(s.max_stories, Some(2));

        let s = canon("Maximum height: 3 stories", "R-1AA");
        assert_eq!(s.max_height_ft, None);
        assert_eq!(s.max_stories, Some(3));
    }

    #[test]
    fn test_cross_reference_numbers_skipped() {
        let s = canon("Minimum lot area under section 38-79 is 10,000 square feet", "R-1AA");
        assert_eq!(s.min_lot_area_sqft, Some(10000));

        let s = canon("Front setback per Table 3 shall be 25 ft", "R-1AA");
        assert_eq!(s.front_setback_ft, Some(25.0));

        let s = canon("Rear setback (see Sec. 38-1501 and note 4): 20 ft", "R-1AA");
        assert_eq!(s.rear_setback_ft, Some(20.0));

        let s = canon("Side setback as provided in chapter 30", "R-1AA");
        assert_eq!(s.side_setback_ft, None);
    }

    #[test]
    fn test_wrong_unit_is_passed_over() {
        let s = canon("Maximum lot coverage: 2 stories or 40%", "R-1");
        assert_eq!(s.max_lot_coverage_pct, Some(40.0));
        let s = canon("Minimum lot area: 75 ft wide, 8,000 sq ft", "R-1");
        assert_eq!(s.min_lot_area_sqft, Some(8000));
    }

    #[test]
    fn test_district_code_digits_ignored() {
        let s = canon("Minimum lot area (R-1): 7,500 sq. ft.", "R-1");
        assert_eq!(s.min_lot_area_sqft, Some(7500));
    }

    #[test]
    fn test_floor_area_not_lot_area() {
        let s = canon("Minimum living area: 1,200 sq ft", "R-1");
        assert_eq!(s.min_lot_area_sqft, None);
    }

    #[test]
    fn test_frontage_is_width_not_front_setback() {
        let s = canon("Minimum lot frontage: 75 ft", "R-1");
        assert_eq!(s.min_lot_width_ft, Some(75.0));
        assert_eq!(s.front_setback_ft, None);
    }

    #[test]
    fn test_split_clauses_keeps_grouped_numbers() {
        let clauses = split_clauses("10,000 sq. ft. lot, 25 ft front; 10 ft side\nrear 25");
        assert_eq!(
            clauses,
            vec!["10,000 sq. ft. lot", "25 ft front", "10 ft side", "rear 25"]
        );
    }

    #[test]
    fn test_merge_missing_fills_gaps_only() {
        let mut a = canon("Front setback: 25 ft", "R-1");
        let b = canon("Front setback: 30 ft\nRear setback: 20 ft", "R-1");
        merge_missing(&mut a, &b);
        assert_eq!(a.front_setback_ft, Some(25.0));
        assert_eq!(a.rear_setback_ft, Some(20.0));
    }
}
