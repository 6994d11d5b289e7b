//! Response validation: is an acquired payload real ordinance content?
//!
//! Code-library platforms fail in different ways: a static fetch of a
//! client-rendered page returns a JS-disabled shell, a bot wall returns a
//! challenge page with HTTP 200, and a half-loaded render returns the page
//! chrome with empty content tables. [`inspect`] catches all three without
//! side effects.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::types::ResponseStatus;

/// Default length floor (characters) for a usable payload.
///
/// Rendered municipal code pages run to tens of thousands of characters;
/// anything below this cannot hold a district's standards.
pub const DEFAULT_MIN_LENGTH: usize = 20_000;

/// Case-insensitive phrases that only appear on challenge or shell pages.
const BLOCK_PHRASES: &[&str] = &[
    "enable javascript",
    "javascript is disabled",
    "javascript to run this app",
    "checking your browser",
    "just a moment",
    "attention required",
    "verify you are human",
    "are you a robot",
    "cf-browser-verification",
    "cf-chl-",
    "g-recaptcha",
    "h-captcha",
    "request unsuccessful",
];

/// Containers that must hold text on a loaded code-library page.
const CONTENT_CONTAINERS: &[&str] = &["#codecontent", ".chunk-content", "#main-content"];

/// Full validation result, including what triggered a BLOCKED verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub status: ResponseStatus,
    /// Character length of the trimmed payload.
    pub length: usize,
    /// Markers that matched, empty unless blocked.
    pub markers: Vec<String>,
}

/// Classify a payload as USABLE, BLOCKED or EMPTY.
pub fn validate(raw: &str, min_length: usize) -> ResponseStatus {
    inspect(raw, min_length).status
}

/// Classify a payload and report the evidence.
///
/// Block markers are checked before the length floor so that a short
/// challenge page is reported as BLOCKED rather than EMPTY.
pub fn inspect(raw: &str, min_length: usize) -> Validation {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Validation {
            status: ResponseStatus::Empty,
            length,
            markers: Vec::new(),
        };
    }

    let markers = block_markers(trimmed, length >= min_length);
    let status = if !markers.is_empty() {
        ResponseStatus::Blocked
    } else if length < min_length {
        ResponseStatus::Empty
    } else {
        ResponseStatus::Usable
    };

    Validation {
        status,
        length,
        markers,
    }
}

fn block_markers(text: &str, full_size: bool) -> Vec<String> {
    // A full-size page with a <noscript> nag is still a real page; only
    // scan the nag text when the payload is small enough to be a shell.
    let scanned = if full_size {
        noscript_re().replace_all(text, " ").into_owned()
    } else {
        text.to_string()
    };
    let lower = scanned.to_lowercase();

    let mut markers: Vec<String> = BLOCK_PHRASES
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .map(|phrase| phrase.to_string())
        .collect();

    if trace_id_re().is_match(&scanned) {
        markers.push("request_trace_id".to_string());
    }

    markers.extend(empty_container_markers(text));
    markers
}

/// Detect tables and content containers that loaded without data.
fn empty_container_markers(html: &str) -> Vec<String> {
    if !html.contains('<') {
        return Vec::new();
    }
    let document = Html::parse_document(html);
    let mut markers = Vec::new();

    if let (Ok(table_sel), Ok(cell_sel)) = (Selector::parse("table"), Selector::parse("td")) {
        let tables = document.select(&table_sel).count();
        if tables > 0 && document.select(&cell_sel).next().is_none() {
            markers.push("empty_table".to_string());
        }
    }

    for container in CONTENT_CONTAINERS {
        let Ok(sel) = Selector::parse(container) else {
            continue;
        };
        for el in document.select(&sel) {
            let has_text = el.text().any(|t| !t.trim().is_empty());
            if !has_text {
                markers.push(format!("empty_container:{container}"));
                break;
            }
        }
    }

    markers
}

fn noscript_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<noscript\b.*?</noscript>").expect("noscript regex is valid"))
}

/// Request-trace identifiers printed on CDN block pages
/// (Cloudflare Ray ID, Incapsula incident ID, Akamai reference).
fn trace_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:ray\s*id:?\s*(?:<[^>]*>\s*)*[0-9a-f]{16}|incident\s*id:?\s*[0-9a-f-]{8,}|reference\s*#\s*\d+\.[0-9a-f]+\.\d+)",
        )
        .expect("trace id regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A plausible rendered code page with a populated standards table.
    fn real_page(size: usize) -> String {
        let mut html = String::from(
            "<html><body><div id=\"codecontent\"><h2>Sec. 38-1 R-1AA district</h2>\
             <table><tr><th>Standard</th><th>R-1AA</th></tr>\
             <tr><td>Min lot area</td><td>10,000 sq ft</td></tr></table>",
        );
        while html.len() < size {
            html.push_str("<p>Minimum yard requirements shall apply to all lots in the district.</p>");
        }
        html.push_str("</div></body></html>");
        html
    }

    #[test]
    fn test_usable_page() {
        let page = real_page(25_000);
        assert_eq!(validate(&page, DEFAULT_MIN_LENGTH), ResponseStatus::Usable);
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(validate("", DEFAULT_MIN_LENGTH), ResponseStatus::Empty);
        assert_eq!(validate("   \n\t ", DEFAULT_MIN_LENGTH), ResponseStatus::Empty);
        assert_eq!(
            validate("<html><body><p>Hello</p></body></html>", DEFAULT_MIN_LENGTH),
            ResponseStatus::Empty
        );
    }

    #[test]
    fn test_challenge_page_blocked() {
        let page = "<html><head><title>Just a moment...</title></head>\
                    <body>Checking your browser before accessing the site.</body></html>";
        let v = inspect(page, DEFAULT_MIN_LENGTH);
        assert_eq!(v.status, ResponseStatus::Blocked);
        assert!(v.markers.contains(&"just a moment".to_string()));
        assert!(v.markers.contains(&"checking your browser".to_string()));
    }

    #[test]
    fn test_marker_case_insensitive() {
        let page = "PLEASE ENABLE JAVASCRIPT TO CONTINUE";
        assert_eq!(validate(page, 10), ResponseStatus::Blocked);
    }

    #[test]
    fn test_ray_id_blocked() {
        let mut page = real_page(25_000);
        page.push_str("<footer>Cloudflare Ray ID: <strong>8a1b2c3d4e5f6a7b</strong></footer>");
        let v = inspect(&page, DEFAULT_MIN_LENGTH);
        assert_eq!(v.status, ResponseStatus::Blocked);
        assert!(v.markers.contains(&"request_trace_id".to_string()));
    }

    #[test]
    fn test_empty_table_shell_blocked() {
        let mut page = String::from("<html><body><table><thead><tr><th>District</th></tr></thead><tbody></tbody></table>");
        while page.len() < 25_000 {
            page.push_str("<nav><a href=\"/x\">Chapter</a></nav>");
        }
        page.push_str("</body></html>");
        let v = inspect(&page, DEFAULT_MIN_LENGTH);
        assert_eq!(v.status, ResponseStatus::Blocked);
        assert!(v.markers.contains(&"empty_table".to_string()));
    }

    #[test]
    fn test_empty_content_container_blocked() {
        let mut page = String::from("<html><body><div class=\"chunk-content\">  </div>");
        while page.len() < 25_000 {
            page.push_str("<li>Table of contents entry</li>");
        }
        page.push_str("</body></html>");
        let v = inspect(&page, DEFAULT_MIN_LENGTH);
        assert_eq!(v.status, ResponseStatus::Blocked);
        assert!(v
            .markers
            .iter()
            .any(|m| m.starts_with("empty_container:")));
    }

    #[test]
    fn test_noscript_nag_on_real_page_is_usable() {
        let mut page = real_page(25_000);
        page.insert_str(0, "<noscript>Please enable JavaScript for the best experience.</noscript>");
        assert_eq!(validate(&page, DEFAULT_MIN_LENGTH), ResponseStatus::Usable);
    }

    #[test]
    fn test_noscript_shell_is_blocked() {
        let page = "<html><body><noscript>You need to enable JavaScript to run this app.</noscript>\
                    <div id=\"root\"></div></body></html>";
        assert_eq!(validate(page, DEFAULT_MIN_LENGTH), ResponseStatus::Blocked);
    }

    #[test]
    fn test_plain_text_floor() {
        let text = "a".repeat(500);
        assert_eq!(validate(&text, 1000), ResponseStatus::Empty);
        assert_eq!(validate(&text, 100), ResponseStatus::Usable);
    }
}
