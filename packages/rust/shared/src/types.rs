//! Core domain types for wikidex documents, categories, and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawPage
// ---------------------------------------------------------------------------

/// A page as delivered by the retrieval side: raw markup plus metadata.
///
/// Ingest files carry one of these per JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    /// Page title as reported by the source wiki.
    pub title: String,
    /// Unprocessed wiki markup.
    pub markup: String,
    /// Category names supplied out-of-band (not parsed from the body).
    #[serde(default)]
    pub categories: Vec<String>,
    /// Last revision timestamp, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// An upsert request. `indexed_at` is assigned by the store on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    /// Normalized plain text.
    pub content: String,
    pub url: String,
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Display title. Identity is [`title_key`] of this value.
    pub title: String,
    /// Normalized plain text, never null.
    pub content: String,
    /// Canonical page URL.
    pub url: String,
    /// Exactly the categories supplied at the last upsert.
    pub categories: Vec<String>,
    /// Source revision time, if the source reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// When the store last wrote this document.
    pub indexed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Category / SearchResult
// ---------------------------------------------------------------------------

/// A category and the number of documents that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub page_count: u64,
}

/// One ranked search hit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Body excerpt with highlight delimiters around matched terms.
    pub snippet: String,
    pub url: String,
    /// Higher is more relevant. Rounded to three decimals.
    pub relevance_score: f64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Case-insensitive identity of a title.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Trim category names, drop empty ones and repeats, keep first-seen order.
pub fn dedupe_categories<S: AsRef<str>>(categories: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(categories.len());
    for cat in categories {
        let cat = cat.as_ref().trim();
        if !cat.is_empty() && !out.iter().any(|c| c == cat) {
            out.push(cat.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_key_folds_case_and_whitespace() {
        assert_eq!(title_key("  Fishing Rod "), "fishing rod");
        assert_eq!(title_key("ÉPÉE"), title_key("épée"));
    }

    #[test]
    fn dedupe_categories_keeps_first_seen_order() {
        let cats = dedupe_categories(&["Tools", " Tool", "Tools", "", "  "]);
        assert_eq!(cats, vec!["Tools".to_string(), "Tool".to_string()]);
    }

    #[test]
    fn raw_page_from_json_line() {
        let line = r#"{"title":"Fishing","markup":"'''Fishing''' is fun","categories":["Skills"]}"#;
        let page: RawPage = serde_json::from_str(line).expect("parse raw page");
        assert_eq!(page.title, "Fishing");
        assert_eq!(page.categories, vec!["Skills"]);
        assert!(page.last_modified.is_none());
    }

    #[test]
    fn raw_page_with_timestamp() {
        let line = r#"{"title":"Rod","markup":"","last_modified":"2024-03-01T12:00:00Z"}"#;
        let page: RawPage = serde_json::from_str(line).expect("parse raw page");
        assert!(page.categories.is_empty());
        assert_eq!(
            page.last_modified.map(|t| t.to_rfc3339()),
            Some("2024-03-01T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn search_result_serialization() {
        let result = SearchResult {
            title: "Fishing".into(),
            snippet: "**Fishing** is a skill".into(),
            url: "https://wiki.example.org/wiki/Fishing".into(),
            relevance_score: 1.234,
        };
        let json = serde_json::to_string(&result).expect("serialize");
        let parsed: SearchResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, result);
    }
}
