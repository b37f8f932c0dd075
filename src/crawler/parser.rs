//! Extraction of file references and page counts from result pages
//!
//! File references are matched with a fixed pattern over the raw page body
//! rather than through the DOM: the quote-exclusion rule depends on seeing
//! exactly what the pattern captured, including malformed anchors.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// `href` values of the form `/<segment>:<segment>:<segment>`
const FILE_REF_PATTERN: &str = r#"href="(/[^:]+:[^:]+:[^"]+)""#;

/// Last numbered pagination link right before the "Next" link
const PAGE_COUNT_PATTERN: &str = r#"target="_self">([0-9]+)</a>[^"]+"/[^"]+" title="Ctrl - Right Arrow" target="_self">Next<"#;

fn file_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILE_REF_PATTERN).expect("file reference pattern is valid"))
}

fn page_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PAGE_COUNT_PATTERN).expect("page count pattern is valid"))
}

/// Extracts file references from a result page body
///
/// Matches are returned in the order they appear in the body. Captures that
/// contain a literal `"` come from truncated or malformed anchors and are
/// dropped. Duplicates are kept.
///
/// # Example
///
/// ```
/// use search_disco::crawler::extract_file_refs;
///
/// let html = r#"<a href="/files:123:report.zip">report</a>"#;
/// assert_eq!(extract_file_refs(html), vec!["/files:123:report.zip"]);
/// ```
pub fn extract_file_refs(body: &str) -> Vec<&str> {
    file_ref_regex()
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|link| !link.contains('"'))
        .collect()
}

/// Extracts the number of result pages from the first result page
///
/// The regular pagination bar is tried first. Result sets that fit in a
/// single pagination window render the last page as
/// `<span class="rdonly">[ N ]</span>` instead; that layout is only consulted
/// when the pagination bar does not match.
///
/// # Returns
///
/// * `Some(n)` - The page count found in the page
/// * `None` - Neither layout is present
pub fn extract_page_count(html: &str) -> Option<u64> {
    if let Some(count) = page_count_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
    {
        return Some(count);
    }

    extract_readonly_page_count(html)
}

/// Reads the page count from the `span.rdonly` element
fn extract_readonly_page_count(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("span.rdonly").ok()?;

    document.select(&selector).find_map(|element| {
        let text = element.text().collect::<String>();
        let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
        inner.trim().parse().ok()
    })
}
