//! Small text helpers for scraped markup: tag stripping and HTML entity
//! decoding.
//!
//! Inner whitespace of extracted text is left as written; record identities
//! are derived from titles, so any rewriting here would split a play from
//! its stored copy.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Remove every `<...>` tag.
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").into_owned()
}

/// Decode HTML5 named entities and numeric character references. Unknown
/// or invalid references are left as written.
pub fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Visible text of a fragment: tags removed, outer whitespace trimmed,
/// entities decoded. Entities are decoded last so an encoded `&lt;` never
/// becomes a tag that gets stripped.
pub fn inner_text(fragment: &str) -> String {
    decode_entities(strip_tags(fragment).trim())
}
