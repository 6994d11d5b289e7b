//! Fragment extraction from acquired code pages.
//!
//! Municipal code pages publish dimensional standards two ways: summary
//! tables (one district per column or one district per row) and narrative
//! sections headed by the district code. Both are cut into per-district
//! [`RawFragment`]s here; numbers are read later by the canonicalizer.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::canonicalize::{detect_district, merge_missing, Canonicalizer, RawFragment};
use crate::registry::{normalize_code, Jurisdiction};
use crate::types::{CanonicalizeError, DimensionalStandard, SourceCitation};

/// Elements whose text never carries a value (footnote markers, scripts).
const SKIPPED: &[&str] = &["sup", "script", "style", "noscript", "template"];

/// Elements that end a line of flattened text.
const BLOCKS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "tr", "table", "thead", "tbody", "tfoot", "section",
    "article", "blockquote", "dt", "dd", "h1", "h2", "h3", "h4", "h5", "h6", "caption",
];

/// A fragment attributed to one district.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictFragment {
    /// District code as written in the source.
    pub district_code: String,
    pub fragment: RawFragment,
}

/// Standards extracted from one document, plus the fragments that were rejected.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub standards: Vec<DimensionalStandard>,
    pub rejected: Vec<CanonicalizeError>,
}

/// Flatten an HTML snippet to text.
///
/// Table rows become `label: value` lines, block elements end a line and
/// `<sup>` footnote markers are dropped before any text is read.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    walk_children(fragment.root_element(), &mut out);
    clean_lines(&out)
}

fn walk_children(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if SKIPPED.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }
            walk_children(child_el, out);
            if name == "td" || name == "th" {
                out.push_str(": ");
            } else if BLOCKS.contains(&name) {
                out.push('\n');
            }
        }
    }
}

fn clean_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of a single element, footnotes dropped, whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    walk_children(el, &mut out);
    out.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}

/// Whether a cell reads like a district code ("R-1AA", "C-2", "PD-1").
fn looks_like_code(cell: &str) -> bool {
    let code = normalize_code(cell);
    (1..=10).contains(&code.len())
        && code.chars().any(|c| c.is_ascii_uppercase())
        && code.chars().any(|c| c.is_ascii_digit() || c == '-')
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

fn has_ancestor(el: ElementRef<'_>, names: &[&str]) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| names.contains(&e.name()))
    })
}

fn table_rows(table: ElementRef<'_>, row_sel: &Selector, cell_sel: &Selector) -> Vec<Vec<String>> {
    table
        .select(row_sel)
        .map(|row| row.select(cell_sel).map(element_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect()
}

/// Cut every standards table in `html` into per-district fragments.
///
/// Header cells that look like district codes but are unknown to the
/// authority come back as `MalformedFragment` errors.
pub fn table_fragments(
    html: &str,
    authority: &Jurisdiction,
    source: &SourceCitation,
) -> Vec<Result<DistrictFragment, CanonicalizeError>> {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for table in document.select(&table_sel) {
        let rows = table_rows(table, &row_sel, &cell_sel);
        let Some(header_idx) = rows.iter().position(|r| r.len() >= 2) else {
            continue;
        };
        let header = &rows[header_idx];
        let body = &rows[header_idx + 1..];

        let column_codes: Vec<usize> = (1..header.len())
            .filter(|&j| authority.knows_district(&header[j]) || looks_like_code(&header[j]))
            .collect();
        let row_codes: Vec<usize> = (0..body.len())
            .filter(|&i| {
                body[i]
                    .first()
                    .is_some_and(|c| authority.knows_district(c) || looks_like_code(c))
            })
            .collect();

        let known_columns = column_codes
            .iter()
            .filter(|&&j| authority.knows_district(&header[j]))
            .count();
        let known_rows = row_codes
            .iter()
            .filter(|&&i| authority.knows_district(&body[i][0]))
            .count();

        if !column_codes.is_empty() && known_columns >= known_rows {
            for j in column_codes {
                let lines = body.iter().filter_map(|row| {
                    let label = row.first()?;
                    let value = row.get(j).filter(|v| !v.is_empty())?;
                    Some(format!("{label}: {value}"))
                });
                out.push(district_fragment(&header[j], lines, authority, source));
            }
        } else if !row_codes.is_empty() {
            for i in row_codes {
                let row = &body[i];
                let lines = (1..row.len()).filter_map(|j| {
                    let label = header.get(j)?;
                    let value = Some(&row[j]).filter(|v| !v.is_empty())?;
                    Some(format!("{label}: {value}"))
                });
                out.push(district_fragment(&row[0], lines, authority, source));
            }
        }
    }
    out
}

fn district_fragment(
    code: &str,
    lines: impl Iterator<Item = String>,
    authority: &Jurisdiction,
    source: &SourceCitation,
) -> Result<DistrictFragment, CanonicalizeError> {
    if !authority.knows_district(code) {
        return Err(CanonicalizeError::MalformedFragment {
            jurisdiction: authority.id.clone(),
            reason: format!("table names unknown district {:?}", normalize_code(code)),
        });
    }
    let text = lines.collect::<Vec<_>>().join("\n");
    Ok(DistrictFragment {
        district_code: code.to_string(),
        fragment: RawFragment::text(text, source.clone()),
    })
}

/// Collect narrative sections: a heading naming a known district starts a
/// section, and following paragraphs and list items belong to it until
/// the next heading.
pub fn narrative_fragments(
    html: &str,
    authority: &Jurisdiction,
    source: &SourceCitation,
) -> Vec<DistrictFragment> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("h1, h2, h3, h4, h5, h6, p, li") else {
        return Vec::new();
    };

    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for el in document.select(&sel) {
        if has_ancestor(el, &["table"]) {
            continue;
        }
        let name = el.value().name();
        let text = element_text(el);
        if name.starts_with('h') {
            sections.extend(current.take());
            if let Some(code) = detect_district(&text, authority) {
                current = Some((code.to_string(), Vec::new()));
            }
        } else if name == "p" && has_ancestor(el, &["li"]) {
            continue;
        } else if let Some((_, lines)) = current.as_mut() {
            if !text.is_empty() {
                lines.push(text);
            }
        }
    }
    sections.extend(current);

    sections
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(code, lines)| DistrictFragment {
            district_code: code,
            fragment: RawFragment::text(lines.join("\n"), source.clone()),
        })
        .collect()
}

/// Extract standards for every known district found in a document.
///
/// Table values take precedence; narrative sections fill fields the tables
/// left empty. Records with no numeric field are dropped.
pub fn extract_standards(
    html: &str,
    authority: &Jurisdiction,
    source: &SourceCitation,
) -> Extraction {
    let canonicalizer = Canonicalizer::new(authority);
    let mut by_code: BTreeMap<String, DimensionalStandard> = BTreeMap::new();
    let mut rejected = Vec::new();

    let fragments = table_fragments(html, authority, source)
        .into_iter()
        .chain(narrative_fragments(html, authority, source).into_iter().map(Ok));

    for fragment in fragments {
        let result =
            fragment.and_then(|f| canonicalizer.canonicalize(&f.fragment, &f.district_code));
        match result {
            Ok(record) => match by_code.entry(record.district_code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => merge_missing(slot.get_mut(), &record),
            },
            Err(e) => {
                tracing::warn!(jurisdiction = %authority.id, "skipping fragment: {e}");
                rejected.push(e);
            }
        }
    }

    let standards: Vec<DimensionalStandard> = by_code
        .into_values()
        .filter(|s| s.populated_fields() > 0)
        .collect();
    tracing::info!(
        jurisdiction = %authority.id,
        districts = standards.len(),
        rejected = rejected.len(),
        "extracted dimensional standards"
    );
    Extraction {
        standards,
        rejected,
    }
}
