//! Ranked search over stored documents.
//!
//! Queries are reduced to plain word tokens before they reach FTS5, so user
//! input can never inject FTS5 query syntax. A query with no usable tokens
//! returns nothing without touching the index.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use wikidex_shared::{Result, SearchConfig, SearchResult};
use wikidex_storage::{IndexQuery, Storage};

/// Read-only search over a [`Storage`] handle.
pub struct SearchEngine<'a> {
    storage: &'a Storage,
    config: SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(storage: &'a Storage, config: SearchConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Limit actually applied: `default_limit` when none is given, clamped
    /// to `1..=max_limit`.
    pub fn effective_limit(&self, limit: Option<u32>) -> u32 {
        let max = self.config.max_limit.max(1);
        limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, max)
    }

    /// Search for documents matching every token of `query` (or any token
    /// when `match_any` is set), best match first.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: Option<u32>) -> Result<Vec<SearchResult>> {
        let tokens = sanitize_query(query);
        if tokens.is_empty() {
            debug!("query has no searchable tokens");
            return Ok(Vec::new());
        }

        let limit = self.effective_limit(limit);

        let match_expr = match_expression(&tokens, self.config.match_any);
        let hits = self
            .storage
            .search_index(&IndexQuery {
                match_expr: &match_expr,
                title_weight: self.config.title_weight,
                body_weight: self.config.body_weight,
                snippet_tokens: self.config.snippet_tokens,
                highlight_open: &self.config.highlight_open,
                highlight_close: &self.config.highlight_close,
                ellipsis: &self.config.ellipsis,
                limit,
            })
            .await?;

        debug!(tokens = tokens.len(), limit, hits = hits.len(), "search complete");

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                snippet: hit.snippet,
                url: hit.url,
                relevance_score: relevance(hit.rank),
            })
            .collect())
    }
}

/// Reduce a raw query to search tokens.
///
/// Everything but word characters, whitespace and `-` is removed, the rest
/// is split on whitespace, and tokens without a single word character
/// (a lone `-`) are dropped.
pub fn sanitize_query(query: &str) -> Vec<String> {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

    DISALLOWED_RE
        .replace_all(query, "")
        .split_whitespace()
        .filter(|token| token.chars().any(|c| c.is_alphanumeric() || c == '_'))
        .map(str::to_string)
        .collect()
}

/// Quote each token as an FTS5 string; adjacent strings are an implicit AND.
fn match_expression(tokens: &[String], match_any: bool) -> String {
    let joiner = if match_any { " OR " } else { " " };
    tokens
        .iter()
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(joiner)
}

/// bm25 is lower-is-better; flip it and keep three decimals.
fn relevance(rank: f64) -> f64 {
    let score = (-rank * 1000.0).round() / 1000.0;
    if score == 0.0 { 0.0 } else { score }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wikidex_shared::NewDocument;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("wikidex_search_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn doc(title: &str, content: &str) -> NewDocument {
        NewDocument {
            title: title.into(),
            content: content.into(),
            url: format!("https://wiki.example.org/wiki/{}", title.replace(' ', "_")),
            categories: Vec::new(),
            last_modified: None,
        }
    }

    /// Documents that share no tokens with the queries below, so every
    /// query term stays rare enough for bm25 to reward it.
    async fn seed_fillers(storage: &Storage) {
        for (title, content) in [
            ("Shrimp", "Small crustacean found in shallow water."),
            ("Oak Log", "Wood cut from an oak tree."),
            ("Bread", "Baked from flour and water."),
            ("Copper Ore", "Mined from copper rocks."),
        ] {
            storage.upsert_document(&doc(title, content)).await.unwrap();
        }
    }

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_query("fishing rod"), vec!["fishing", "rod"]);
        assert_eq!(sanitize_query("  \"fish*\" OR (cod)  "), vec!["fish", "OR", "cod"]);
        assert_eq!(sanitize_query("half-life 2"), vec!["half-life", "2"]);
        assert_eq!(sanitize_query("don't"), vec!["dont"]);
    }

    #[test]
    fn sanitize_drops_empty_tokens() {
        assert!(sanitize_query("").is_empty());
        assert!(sanitize_query("   ").is_empty());
        assert!(sanitize_query("!!! ??? ...").is_empty());
        assert!(sanitize_query(" - -- ").is_empty());
    }

    #[test]
    fn match_expression_quotes_tokens() {
        let tokens = vec!["fishing".to_string(), "half-life".to_string()];
        assert_eq!(match_expression(&tokens, false), "\"fishing\" \"half-life\"");
        assert_eq!(match_expression(&tokens, true), "\"fishing\" OR \"half-life\"");
    }

    #[test]
    fn relevance_flips_and_rounds() {
        assert_eq!(relevance(-1.23456), 1.235);
        assert_eq!(relevance(-0.0001), 0.0);
        assert!(relevance(-2.0) > relevance(-1.0));
    }

    #[tokio::test]
    async fn empty_queries_return_nothing() {
        let storage = test_storage().await;
        storage.upsert_document(&doc("Fishing", "Catching fish.")).await.unwrap();
        let engine = SearchEngine::new(&storage, SearchConfig::default());

        for query in ["", "   ", "!@#$%^&*()", "\"\"", "-"] {
            assert!(engine.search(query, None).await.unwrap().is_empty(), "{query:?}");
        }
    }

    #[tokio::test]
    async fn exact_title_ranks_first() {
        let storage = test_storage().await;
        seed_fillers(&storage).await;
        storage
            .upsert_document(&doc("Fishing Rod", "A rod used for fishing in rivers."))
            .await
            .unwrap();
        storage
            .upsert_document(&doc("Fishing", "Fishing is a skill for catching fish."))
            .await
            .unwrap();

        let engine = SearchEngine::new(&storage, SearchConfig::default());
        let results = engine.search("fishing", None).await.unwrap();
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Fishing", "Fishing Rod"]);
        assert!(results[0].relevance_score >= results[1].relevance_score);
        assert_eq!(results[0].url, "https://wiki.example.org/wiki/Fishing");
    }

    #[tokio::test]
    async fn title_match_beats_body_match() {
        let storage = test_storage().await;
        seed_fillers(&storage).await;
        storage
            .upsert_document(&doc("Harpoon", "A long spear. Some use it for lobster."))
            .await
            .unwrap();
        storage
            .upsert_document(&doc("Lobster", "A crustacean caught with a cage."))
            .await
            .unwrap();

        let engine = SearchEngine::new(&storage, SearchConfig::default());
        let results = engine.search("lobster", None).await.unwrap();
        assert_eq!(results[0].title, "Lobster");
        assert_eq!(results[1].title, "Harpoon");
        assert!(results[0].relevance_score > results[1].relevance_score);
    }

    #[tokio::test]
    async fn tokens_are_conjunctive_by_default() {
        let storage = test_storage().await;
        seed_fillers(&storage).await;
        storage.upsert_document(&doc("Cod", "A salty sea fish.")).await.unwrap();
        storage.upsert_document(&doc("Trout", "A river fish.")).await.unwrap();

        let engine = SearchEngine::new(&storage, SearchConfig::default());
        let results = engine.search("salty fish", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Cod");

        let any = SearchEngine::new(
            &storage,
            SearchConfig {
                match_any: true,
                ..SearchConfig::default()
            },
        );
        assert_eq!(any.search("salty fish", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn snippet_marks_matches() {
        let storage = test_storage().await;
        seed_fillers(&storage).await;
        storage
            .upsert_document(&doc("Cod", "The cod is a common fish of cold seas."))
            .await
            .unwrap();

        let engine = SearchEngine::new(&storage, SearchConfig::default());
        let results = engine.search("common", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].snippet.contains("**common**"), "{}", results[0].snippet);
    }

    #[tokio::test]
    async fn limit_defaults_and_clamps() {
        let storage = test_storage().await;
        for i in 0..8 {
            storage
                .upsert_document(&doc(&format!("Fish {i}"), "A fish."))
                .await
                .unwrap();
        }
        let config = SearchConfig {
            default_limit: 3,
            max_limit: 6,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(&storage, config);

        assert_eq!(engine.effective_limit(None), 3);
        assert_eq!(engine.effective_limit(Some(0)), 1);
        assert_eq!(engine.effective_limit(Some(100)), 6);

        assert_eq!(engine.search("fish", None).await.unwrap().len(), 3);
        assert_eq!(engine.search("fish", Some(100)).await.unwrap().len(), 6);
        assert_eq!(engine.search("fish", Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn punctuation_inside_query_is_ignored() {
        let storage = test_storage().await;
        seed_fillers(&storage).await;
        storage.upsert_document(&doc("Cod", "A salty sea fish.")).await.unwrap();

        let engine = SearchEngine::new(&storage, SearchConfig::default());
        let results = engine.search("cod!!! (NEAR)", None).await;
        assert!(results.unwrap().is_empty());
        let results = engine.search("\"cod\"*", None).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
