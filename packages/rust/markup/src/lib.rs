//! Wiki markup to plain text.
//!
//! [`normalize`] runs a fixed sequence of passes over raw wiki markup and
//! returns readable plain text. It never fails: constructs it cannot make
//! sense of are dropped, and template nesting deeper than the configured cap
//! is left unresolved (and then swept of its delimiters).
//!
//! Pass order:
//! 1. inclusion guards, 2. comments, 3. switches and directives,
//! 4. media and category references, 5. templates, 6. tables, 7. links,
//! 8. headers, 9. emphasis, 10. tags, 11. lists, 12. horizontal rules,
//! 13. character references, 14. whitespace.

mod entities;
mod inline;
mod strip;
mod tables;
mod templates;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use wikidex_shared::NormalizeConfig;

pub use templates::{TemplateKind, TemplateResolution, resolve_templates};

/// Template passes allowed when no configuration is given.
pub const DEFAULT_MAX_TEMPLATE_PASSES: usize = 50;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Bounds for a normalization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Upper bound on template resolution passes.
    pub max_template_passes: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_template_passes: DEFAULT_MAX_TEMPLATE_PASSES,
        }
    }
}

impl From<&NormalizeConfig> for NormalizeOptions {
    fn from(config: &NormalizeConfig) -> Self {
        Self {
            max_template_passes: config.max_template_passes,
        }
    }
}

/// Plain text plus template diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Finished plain text.
    pub text: String,
    /// Template passes performed.
    pub template_passes: usize,
    /// Whether the template pass cap was reached with templates remaining.
    pub capped: bool,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Normalize raw markup with default options.
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, &NormalizeOptions::default()).text
}

/// Normalize raw markup and report how template resolution went.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn normalize_with(raw: &str, opts: &NormalizeOptions) -> Normalized {
    let mut text = strip::strip_inclusion_guards(raw);
    text = strip::strip_comments(&text);
    text = strip::strip_directives(&text);
    text = strip::strip_media_and_categories(&text);

    let resolution = templates::resolve_templates(&text, opts.max_template_passes);
    if resolution.capped {
        debug!(
            passes = resolution.passes,
            "template pass cap reached, leaving remaining templates unresolved"
        );
    }

    text = tables::flatten_tables(&resolution.text);
    text = inline::convert_links(&text);
    text = inline::convert_headers(&text);
    text = inline::strip_emphasis(&text);
    text = inline::convert_tags(&text);
    text = inline::normalize_lists(&text);
    text = inline::remove_rules(&text);
    text = entities::decode_entities(&text);
    text = inline::sweep_delimiters(&text);
    text = collapse_whitespace(&text);

    debug!(
        final_len = text.len(),
        template_passes = resolution.passes,
        "normalization complete"
    );

    Normalized {
        text,
        template_passes: resolution.passes,
        capped: resolution.capped,
    }
}

/// Single spaces within lines, no edge spaces on lines, at most one blank
/// line in a row, nothing leading or trailing.
fn collapse_whitespace(text: &str) -> String {
    static HSPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let spaced = HSPACE_RE.replace_all(text, " ");
    let trimmed_lines = spaced.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    MULTI_BLANK_RE
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn quote_template() {
        assert_eq!(normalize("{{quote|Hello world}}"), "\"Hello world\"");
    }

    #[test]
    fn main_template() {
        assert_eq!(normalize("{{main|Fishing}}"), "(See: Fishing)");
    }

    #[test]
    fn unknown_and_nested_templates_vanish() {
        assert_eq!(normalize("{{stub}}"), "");
        assert_eq!(normalize("{{outer|{{inner}}}}"), "");
    }

    #[test]
    fn infobox_keeps_permitted_keys_only() {
        let out = normalize("{{Infobox item|name = Apple|image = apple.png}}");
        assert!(out.contains("name: Apple"));
        assert!(!out.to_lowercase().contains("image"));
    }

    #[test]
    fn links() {
        assert_eq!(normalize("[[Fishing Rod|rod]]"), "rod");
        assert_eq!(normalize("[[Fishing]]"), "Fishing");
    }

    #[test]
    fn lists() {
        assert_eq!(normalize("* A\n** B"), "- A\n- B");
    }

    #[test]
    fn full_article() {
        let input = "\
{{DISPLAYTITLE:Fishing}}__NOTOC__
{{Infobox skill|name = Fishing|icon = Fishing.png|members = No}}
'''Fishing''' is a [[skill]] that lets players catch [[Fish (item)|fish]].<ref>Patch notes</ref>
<!-- editors: keep this short -->
[[File:Fishing rod.png|thumb|A [[Fishing Rod|rod]]]]

== Equipment ==
{{main|Fishing Rod}}
* [[Fishing Rod]]
** Bait &amp; lures
----
{| class=\"wikitable\"
! Fish !! Level
|-
| Shrimp || 1
|}
[[Category:Skills]]";

        let expected = "\
name: Fishing
members: No

Fishing is a skill that lets players catch fish.Patch notes

Equipment

(See: Fishing Rod)
- Fishing Rod
- Bait & lures

Fish | Level
Shrimp | 1";

        assert_eq!(normalize(input), expected);
    }

    /// Character references are decoded after the markup passes, so text that
    /// only spells markup through references (`&#42; item`, `&lt;b&gt;`) comes
    /// out as live markup and is rewritten by a second run. Inputs here stay
    /// clear of that.
    #[test]
    fn idempotent_on_clean_output() {
        let inputs = [
            "'''Cod''' is a [[fish]].\n\n== Catching ==\n* Use a [[Fishing Rod|rod]]",
            "{{quote|Hello world}} and {{main|Fishing}}",
            "Plain sentence with - a dash and a: colon.",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn escaped_markup_decoded_last() {
        assert_eq!(normalize("&#42; item"), "* item");
        assert_eq!(normalize("&lt;b&gt;bold&lt;/b&gt;"), "<b>bold</b>");
        assert_eq!(normalize("&#91;&#91;Fishing&#93;&#93;"), "Fishing");
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(normalize("  a \t  b  \n\n\n\n\n  c  "), "a b\n\nc");
        assert_eq!(normalize("a&nbsp;&nbsp;b"), "a b");
    }

    #[test]
    fn never_leaves_delimiters() {
        let inputs = [
            "{{unclosed",
            "closed}} only",
            "[[dangling link",
            "{{a|[[b}}]]",
            "{{{{{{}}}}}}",
            "[[[[x]]]]",
        ];
        for input in inputs {
            let out = normalize(input);
            for delim in ["{{", "}}", "[[", "]]"] {
                assert!(!out.contains(delim), "{input:?} -> {out:?}");
            }
        }
    }

    #[test]
    fn capped_run_is_reported_and_swept() {
        let input = format!("{}core{}", "{{t|".repeat(10), "}}".repeat(10));
        let result = normalize_with(&input, &NormalizeOptions { max_template_passes: 3 });
        assert!(result.capped);
        assert_eq!(result.template_passes, 3);
        assert!(!result.text.contains("{{"));

        let full = normalize_with(&input, &NormalizeOptions::default());
        assert!(!full.capped);
        assert_eq!(full.text, "");
    }

    #[test]
    fn options_from_config() {
        let config = NormalizeConfig {
            max_template_passes: 7,
        };
        assert_eq!(NormalizeOptions::from(&config).max_template_passes, 7);
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        let result = normalize_with("", &NormalizeOptions::default());
        assert_eq!(result.template_passes, 0);
        assert!(!result.capped);
    }

    #[test]
    fn nested_stray_brackets_finish_quickly() {
        let depth = 25_000;
        let input = format!("text {}{} more", "{[".repeat(depth), "[{".repeat(depth));
        let start = Instant::now();
        assert_eq!(normalize(&input), "text more");
        assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    }

    #[test]
    fn unclosed_media_lines_finish_quickly() {
        let input = "[[File:x.png|thumb\n".repeat(6_000);
        let start = Instant::now();
        assert_eq!(normalize(&input), "");
        assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    }
}
