//! Inline conversions: links, headers, emphasis, tags, lists, rules.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// `[[target|label]]` → label, `[[target]]` → target,
/// `[http://x label]` → label, `[http://x]` → `x`.
pub(crate) fn convert_links(text: &str) -> String {
    static PIPED_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[\[([^\[\]|]*)\|([^\[\]]*)\]\]").expect("valid regex")
    });
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[([^\[\]|]*)\]\]").expect("valid regex"));
    static LABELED_EXTERNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[(?:(?:(?:https?|ftp):)?//|mailto:)[^\s\[\]]+\s+([^\[\]]+)\]")
            .expect("valid regex")
    });
    static BARE_EXTERNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[(?:(?:https?|ftp):)?//([^\s\[\]]+)\]").expect("valid regex")
    });

    let text = PIPED_LINK_RE.replace_all(text, |caps: &regex::Captures| {
        let label = caps[2].trim();
        if label.is_empty() {
            link_target_text(&caps[1])
        } else {
            label.to_string()
        }
    });
    let text = LINK_RE.replace_all(&text, |caps: &regex::Captures| link_target_text(&caps[1]));
    let text = LABELED_EXTERNAL_RE.replace_all(&text, "$1");
    BARE_EXTERNAL_RE.replace_all(&text, "$1").to_string()
}

/// Display text of an unlabeled internal link target.
fn link_target_text(target: &str) -> String {
    let target = target.trim();
    let target = target.strip_prefix(':').unwrap_or(target);
    let target = target.strip_prefix('#').unwrap_or(target);
    target.trim().to_string()
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// `== Title ==` → `Title` on its own line.
pub(crate) fn convert_headers(text: &str) -> String {
    static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*={1,6}[ \t]*(.+?)[ \t]*={1,6}[ \t]*$").expect("valid regex")
    });

    HEADER_RE
        .replace_all(text, |caps: &regex::Captures| {
            let title = caps[1].trim_matches('=').trim();
            format!("\n{title}\n")
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Emphasis
// ---------------------------------------------------------------------------

/// Remove `''`, `'''` and `'''''` runs, keeping the emphasized text.
pub(crate) fn strip_emphasis(text: &str) -> String {
    static EMPHASIS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"'{2,}").expect("valid regex"));

    EMPHASIS_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// `<br>` becomes a line break; every other tag is dropped, inner text kept.
pub(crate) fn convert_tags(text: &str) -> String {
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?\s*br\s*/?>").expect("valid regex"));
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*)?/?>").expect("valid regex")
    });

    let text = BR_RE.replace_all(text, "\n");
    TAG_RE.replace_all(&text, "").to_string()
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// Bulleted and numbered items at any depth become `- item`;
/// definition and indent markers are dropped.
pub(crate) fn normalize_lists(text: &str) -> String {
    static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*[:;]*[*#][*#:;]*[ \t]*").expect("valid regex")
    });
    static DEFINITION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[;:]+[ \t]*").expect("valid regex"));

    let text = BULLET_RE.replace_all(text, "- ");
    DEFINITION_RE.replace_all(&text, "").to_string()
}

// ---------------------------------------------------------------------------
// Horizontal rules
// ---------------------------------------------------------------------------

pub(crate) fn remove_rules(text: &str) -> String {
    static RULE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]*-{4,}[ \t]*$").expect("valid regex"));

    RULE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Leftover delimiters
// ---------------------------------------------------------------------------

/// Remove `{{`, `}}`, `[[` and `]]` that survived conversion (capped or
/// unbalanced input), including pairs that only meet once an inner pair is
/// gone. One pass: a bracket equal to the last kept character cancels it.
pub(crate) fn sweep_delimiters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}' | '[' | ']') && out.ends_with(c) {
            out.pop();
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
