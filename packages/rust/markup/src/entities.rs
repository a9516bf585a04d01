//! Character reference decoding (`&amp;`, `&#8212;`, `&#x2014;`).

use std::borrow::Cow;

/// Decode named, decimal, and hexadecimal character references.
///
/// Decoding is a single pass, so `&amp;lt;` becomes `&lt;` rather than `<`.
/// Unknown names and out-of-range code points are left as written.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    match html_escape::decode_html_entities(text) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}
