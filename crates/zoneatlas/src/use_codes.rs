//! Assessor land-use code classification.
//!
//! Use codes follow the Florida DOR two-digit major categories. Assessor
//! rolls publish them either as the bare two-digit code (`"01"`) or as a
//! four-digit code with a local suffix (`"0100"`); only the leading two
//! digits are significant here.

use serde::{Deserialize, Serialize};

/// Broad land-use category used to pick a representative district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCategory {
    Residential,
    Commercial,
    Recreational,
    Industrial,
    Agricultural,
    Institutional,
    Utility,
}

/// Parse the major (two-digit) category out of an assessor use code.
pub fn major_code(use_code: &str) -> Option<u8> {
    let digits: String = use_code
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.len() {
        1 | 2 => digits.parse().ok(),
        3 => digits[..1].parse().ok(),
        4 => digits[..2].parse().ok(),
        _ => None,
    }
}

/// Map an assessor use code to its land-use category.
///
/// Codes outside the recognised ranges (vacant acreage, rights-of-way,
/// submerged land, ...) return `None`.
pub fn classify(use_code: &str) -> Option<UseCategory> {
    let major = major_code(use_code)?;
    match major {
        0..=9 => Some(UseCategory::Residential),
        10..=32 | 39 => Some(UseCategory::Commercial),
        33..=38 | 97 => Some(UseCategory::Recreational),
        40..=49 => Some(UseCategory::Industrial),
        50..=69 => Some(UseCategory::Agricultural),
        70..=89 => Some(UseCategory::Institutional),
        91 | 96 | 98 => Some(UseCategory::Utility),
        _ => None,
    }
}
