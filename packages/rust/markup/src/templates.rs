//! Template resolution.
//!
//! Templates (`{{name|arg|...}}`) may nest. Each pass rewrites every
//! innermost template (one with no `{{` inside it) and the whole text is
//! rescanned, so nesting depth `n` needs `n` passes. The number of passes is
//! capped; when the cap is hit the remaining markers are left in place and
//! the result says so.

use std::sync::LazyLock;

use regex::Regex;

/// Infobox keys that only carry layout or media and never reader-visible text.
const INFOBOX_DENY_KEYS: &[&str] = &[
    "image",
    "icon",
    "caption",
    "image-width",
    "image-height",
    "imagewidth",
    "imageheight",
    "style",
    "class",
    "colspan",
    "rowspan",
];

/// Outcome of [`resolve_templates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateResolution {
    /// Text after resolution.
    pub text: String,
    /// Rewrite passes performed.
    pub passes: usize,
    /// `true` when templates were still present after `max_passes`.
    pub capped: bool,
}

/// The template families the resolver knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `{{Infobox ...|key = value|...}}` → one `key: value` line per kept pair.
    Infobox,
    /// `{{quote|text}}` / `{{cquote|text}}` → `"text"`.
    Quote,
    /// `{{color|red|text}}` → `text`.
    Color,
    /// `{{main|page}}` / `{{see also|page}}` → `(See: page)`.
    SeeAlso,
    /// `{{nihongo|text|...}}` → `text`.
    Nihongo,
    /// Anything else; discarded with its arguments.
    Unknown,
}

impl TemplateKind {
    /// Classify a template by its (case-insensitive) name.
    pub fn classify(name: &str) -> Self {
        let name = name
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        if name.starts_with("infobox") {
            return Self::Infobox;
        }
        match name.as_str() {
            "quote" | "cquote" => Self::Quote,
            "color" => Self::Color,
            "main" | "see also" => Self::SeeAlso,
            "nihongo" => Self::Nihongo,
            _ => Self::Unknown,
        }
    }

    /// Render the template's arguments (everything after the name).
    pub fn render(self, args: &[&str]) -> String {
        let arg = |i: usize| {
            args.get(i)
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
        };

        match self {
            Self::Infobox => render_infobox(args),
            Self::Quote => arg(0).map(|t| format!("\"{t}\"")).unwrap_or_default(),
            Self::Color => arg(1).map(str::to_string).unwrap_or_default(),
            Self::SeeAlso => arg(0).map(|t| format!("(See: {t})")).unwrap_or_default(),
            Self::Nihongo => arg(0).map(str::to_string).unwrap_or_default(),
            Self::Unknown => String::new(),
        }
    }
}

fn render_infobox(args: &[&str]) -> String {
    let lines: Vec<String> = args
        .iter()
        .filter_map(|arg| {
            let (key, value) = arg.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() || is_denied_key(key) {
                return None;
            }
            Some(format!("{key}: {value}"))
        })
        .collect();

    if lines.is_empty() {
        String::new()
    } else {
        format!("\n{}\n", lines.join("\n"))
    }
}

fn is_denied_key(key: &str) -> bool {
    let key = key.to_lowercase().replace(['_', ' '], "-");
    INFOBOX_DENY_KEYS.contains(&key.as_str())
}

// ---------------------------------------------------------------------------
// Resolution loop
// ---------------------------------------------------------------------------

/// Resolve templates innermost-first until none remain or `max_passes` is spent.
pub fn resolve_templates(text: &str, max_passes: usize) -> TemplateResolution {
    let mut current = text.to_string();
    let mut passes = 0;

    loop {
        current = resolve_parameters(&current);
        let spans = innermost_spans(&current);
        if spans.is_empty() {
            return TemplateResolution {
                text: current,
                passes,
                capped: false,
            };
        }
        if passes >= max_passes {
            return TemplateResolution {
                text: current,
                passes,
                capped: true,
            };
        }
        current = rewrite_spans(&current, &spans);
        passes += 1;
    }
}

/// Replace `{{{name|default}}}` parameter references with their default.
fn resolve_parameters(text: &str) -> String {
    static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\{\{\{[^{}|]*(?:\|([^{}]*))?\}\}\}").expect("valid regex")
    });

    if !text.contains("{{{") {
        return text.to_string();
    }
    PARAM_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps.get(1).map_or("", |m| m.as_str()).to_string()
        })
        .into_owned()
}

/// Byte spans `[start, end)` of templates that contain no other `{{`.
///
/// Spans never overlap: each `}}` closes the most recent unclosed `{{`.
fn innermost_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut open = None;
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                open = Some(i);
                i += 2;
            }
            (b'}', b'}') => {
                if let Some(start) = open.take() {
                    spans.push((start, i + 2));
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    spans
}

fn rewrite_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in spans {
        out.push_str(&text[cursor..start]);
        out.push_str(&render_template(&text[start + 2..end - 2]));
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Render the inside of one `{{...}}`.
fn render_template(inner: &str) -> String {
    let segments = split_top_level(inner, '|');
    let Some((name, args)) = segments.split_first() else {
        return String::new();
    };
    TemplateKind::classify(name).render(args)
}

/// Split on `sep` except inside `[[...]]` links.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    debug_assert!(sep.is_ascii());
    let bytes = text.as_bytes();
    let sep = sep as u8;
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"[[") {
            depth += 1;
            i += 2;
            continue;
        }
        if depth > 0 && bytes[i..].starts_with(b"]]") {
            depth -= 1;
            i += 2;
            continue;
        }
        if depth == 0 && bytes[i] == sep {
            parts.push(&text[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
