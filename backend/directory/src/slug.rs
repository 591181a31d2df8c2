//! # Slugs
//!
//! URL-safe category names.
//!
//! Spaces become underscores so that common names stay readable
//! (`Other Frameworks` → `Other_Frameworks`). Every other byte outside
//! `[A-Za-z0-9-.~]`, literal underscores and percent signs included, is
//! percent-encoded first, which keeps the mapping injective.
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const SLUG_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

pub fn encode(name: &str) -> String {
    utf8_percent_encode(name, SLUG_SET)
        .to_string()
        .replace(' ', "_")
}

/// Returns `None` when the slug does not decode to valid UTF-8.
pub fn decode(slug: &str) -> Option<String> {
    let spaced = slug.replace('_', " ");

    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}
