//! Ranked full-text queries over the FTS5 index.
//!
//! Scores come from FTS5 `bm25()` with per-column weights, where a lower
//! (more negative) value is a better match. Excerpts come from `snippet()`
//! over the content column.

use libsql::params;
use tracing::debug;

use wikidex_shared::Result;

use crate::{Storage, db_err};

/// A prepared FTS5 query. `match_expr` must already be valid FTS5 syntax.
#[derive(Debug, Clone)]
pub struct IndexQuery<'a> {
    pub match_expr: &'a str,
    pub title_weight: f64,
    pub body_weight: f64,
    pub snippet_tokens: u32,
    pub highlight_open: &'a str,
    pub highlight_close: &'a str,
    pub ellipsis: &'a str,
    pub limit: u32,
}

/// One matching row, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Raw bm25 value; lower is more relevant.
    pub rank: f64,
}

impl Storage {
    /// Run a ranked query against the index. Ties are broken by title.
    pub async fn search_index(&self, query: &IndexQuery<'_>) -> Result<Vec<IndexHit>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT d.title, d.url,
                        snippet(documents_fts, 1, ?2, ?3, ?4, ?5) AS excerpt,
                        bm25(documents_fts, ?6, ?7) AS score
                 FROM documents_fts
                 JOIN documents d ON d.id = documents_fts.rowid
                 WHERE documents_fts MATCH ?1
                 ORDER BY score, d.title
                 LIMIT ?8",
                params![
                    query.match_expr,
                    query.highlight_open,
                    query.highlight_close,
                    query.ellipsis,
                    i64::from(query.snippet_tokens),
                    query.title_weight,
                    query.body_weight,
                    i64::from(query.limit),
                ],
            )
            .await
            .map_err(db_err)?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            hits.push(IndexHit {
                title: row.get::<String>(0).map_err(db_err)?,
                url: row.get::<String>(1).map_err(db_err)?,
                snippet: row.get::<String>(2).unwrap_or_default(),
                rank: row.get::<f64>(3).map_err(db_err)?,
            });
        }

        debug!(expr = query.match_expr, hits = hits.len(), "index query");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{doc, test_storage};

    fn query(expr: &str) -> IndexQuery<'_> {
        IndexQuery {
            match_expr: expr,
            title_weight: 10.0,
            body_weight: 1.0,
            snippet_tokens: 8,
            highlight_open: "[",
            highlight_close: "]",
            ellipsis: "...",
            limit: 10,
        }
    }

    async fn titles(storage: &Storage, expr: &str) -> Vec<String> {
        storage
            .search_index(&query(expr))
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.title)
            .collect()
    }

    #[tokio::test]
    async fn index_follows_inserts_updates_and_removals() {
        let storage = test_storage().await;
        storage.upsert_document(&doc("Cod", "a salty fish", &[])).await.unwrap();
        assert_eq!(titles(&storage, "\"salty\"").await, vec!["Cod"]);

        storage.upsert_document(&doc("cod", "a sweet fish", &[])).await.unwrap();
        assert!(titles(&storage, "\"salty\"").await.is_empty());
        assert_eq!(titles(&storage, "\"sweet\"").await, vec!["Cod"]);

        assert!(storage.remove_document("Cod").await.unwrap());
        assert!(titles(&storage, "\"sweet\"").await.is_empty());
    }

    #[tokio::test]
    async fn rolled_back_batch_leaves_no_index_entries() {
        let storage = test_storage().await;
        let docs = vec![doc("Cod", "phantom text", &[]), doc(" ", "bad", &[])];
        assert!(storage.upsert_documents(&docs).await.is_err());
        assert!(titles(&storage, "\"phantom\"").await.is_empty());
    }

    #[tokio::test]
    async fn snippet_highlights_and_truncates() {
        let storage = test_storage().await;
        let body = "one two three four five six seven eight nine ten eleven twelve \
                    thirteen fourteen fifteen salmon sixteen seventeen eighteen nineteen twenty";
        storage.upsert_document(&doc("Salmon", body, &[])).await.unwrap();

        let hits = storage.search_index(&query("\"salmon\"")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("[salmon]"), "{}", hits[0].snippet);
        assert!(hits[0].snippet.contains("..."), "{}", hits[0].snippet);
        assert!(hits[0].rank < 0.0);
    }

    #[tokio::test]
    async fn limit_caps_hits() {
        let storage = test_storage().await;
        for title in ["Cod", "Salmon", "Trout", "Pike"] {
            storage.upsert_document(&doc(title, "a fish", &[])).await.unwrap();
        }
        let mut q = query("\"fish\"");
        q.limit = 2;
        assert_eq!(storage.search_index(&q).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn diacritics_folded() {
        let storage = test_storage().await;
        storage.upsert_document(&doc("Creme", "crème brûlée", &[])).await.unwrap();
        assert_eq!(titles(&storage, "\"creme\"").await, vec!["Creme"]);
    }
}
