//! Category counts recomputed from stored documents.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, instrument};

use wikidex_shared::{Category, Result};
use wikidex_storage::Storage;

/// Outcome of a [`CategoryAggregator::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Distinct categories with at least one page.
    pub categories: usize,
    /// Document-to-category memberships counted.
    pub memberships: u64,
}

pub struct CategoryAggregator<'a> {
    storage: &'a Storage,
}

impl<'a> CategoryAggregator<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Rebuild the category table from scratch.
    ///
    /// Every document contributes at most one to each of its categories.
    /// The previous table is discarded, so repeated refreshes with no
    /// document changes leave identical rows.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for categories in self.storage.document_categories().await? {
            let distinct: BTreeSet<&str> = categories
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            for name in distinct {
                *counts.entry(name.to_string()).or_default() += 1;
            }
        }

        let categories: Vec<Category> = counts
            .into_iter()
            .map(|(name, page_count)| Category { name, page_count })
            .collect();
        let summary = RefreshSummary {
            categories: categories.len(),
            memberships: categories.iter().map(|c| c.page_count).sum(),
        };

        self.storage.replace_categories(&categories).await?;
        info!(
            categories = summary.categories,
            memberships = summary.memberships,
            "category counts refreshed"
        );
        Ok(summary)
    }

    /// Materialized categories, sorted by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.storage.list_categories().await
    }

    /// Sorted titles of documents in exactly the category `name`.
    pub async fn pages_in_category(&self, name: &str) -> Result<Vec<String>> {
        self.storage.pages_in_category(name).await
    }
}
