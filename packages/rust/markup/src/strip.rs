//! Structural pre-pass: inclusion guards, comments, directives, media and
//! category references.
//!
//! Each pass is a function `&str -> String`. None of them need anything but
//! the raw text, so they run before template resolution.

use std::sync::LazyLock;

use regex::Regex;

/// Link namespaces that render as media or category tags rather than text.
const TAG_NAMESPACES: &[&str] = &["file", "image", "media", "category"];

// ---------------------------------------------------------------------------
// Pass 1: Inclusion guards
// ---------------------------------------------------------------------------

/// Drop `<noinclude>` regions and unwrap `<includeonly>` / `<onlyinclude>`.
///
/// An unclosed `<noinclude>` hides everything after it.
pub(crate) fn strip_inclusion_guards(text: &str) -> String {
    static NOINCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<noinclude\s*>(?:.*?</noinclude\s*>|.*\z)").expect("valid regex")
    });
    static INCLUDE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)</?\s*(?:includeonly|onlyinclude)\s*/?>").expect("valid regex")
    });

    let text = NOINCLUDE_RE.replace_all(text, "");
    INCLUDE_MARKER_RE.replace_all(&text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Comments
// ---------------------------------------------------------------------------

/// Remove `<!-- ... -->` blocks. An unclosed comment runs to the end.
pub(crate) fn strip_comments(text: &str) -> String {
    static COMMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("valid regex"));

    COMMENT_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Magic words and directives
// ---------------------------------------------------------------------------

/// Remove behaviour switches (`__TOC__`, `__NOTOC__`, ...) and
/// display directives (`{{DISPLAYTITLE:...}}`, `{{DEFAULTSORT:...}}`).
pub(crate) fn strip_directives(text: &str) -> String {
    static SWITCH_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"__[A-Z]+__").expect("valid regex"));
    static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\{\{\s*(?:DISPLAYTITLE|DEFAULTSORT|DEFAULTSORTKEY|DEFAULTCATEGORYSORT)\s*:[^{}]*\}\}",
        )
        .expect("valid regex")
    });

    let text = SWITCH_RE.replace_all(text, "");
    DIRECTIVE_RE.replace_all(&text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Media and category references
// ---------------------------------------------------------------------------

/// Remove `[[File:...]]`, `[[Image:...]]`, `[[Media:...]]` and
/// `[[Category:...]]` including any nested links in their captions.
///
/// `[[:Category:Foo]]` is a visible link, not a tag, and is kept.
/// A reference with no closing `]]` is dropped to the end of its line.
pub(crate) fn strip_media_and_categories(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find("[[") {
        let after = &rest[pos + 2..];
        if !is_tag_reference(after) {
            out.push_str(&rest[..pos + 2]);
            rest = after;
            continue;
        }

        out.push_str(&rest[..pos]);
        rest = match matching_close(after) {
            Some(end) => &after[end..],
            None => {
                let eol = after.find('\n').unwrap_or(after.len());
                &after[eol..]
            }
        };
    }

    out.push_str(rest);
    out
}

/// Whether the text right after `[[` names a media or category namespace.
fn is_tag_reference(target: &str) -> bool {
    let target = target.trim_start();
    let Some(end) = target.find([':', '|', '[', ']', '\n']) else {
        return false;
    };
    if !target[end..].starts_with(':') {
        return false;
    }
    let namespace = target[..end].trim().to_lowercase();
    TAG_NAMESPACES.contains(&namespace.as_str())
}

/// Byte offset just past the `]]` that closes an already-opened `[[`.
///
/// The scan stops at the end of the line, so each unclosed reference costs
/// at most one line.
fn matching_close(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'\n', _) => return None,
            (b'[', b'[') => {
                depth += 1;
                i += 2;
            }
            (b']', b']') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
