//! Materialized category counts and category membership lookups.

use libsql::params;
use tracing::{debug, warn};

use wikidex_shared::{Category, Result, WikidexError};

use crate::{Storage, db_err};

impl Storage {
    /// Replace the whole category table with `categories` in one transaction.
    ///
    /// Entries with a zero count are skipped; the table only ever holds
    /// categories that have at least one page.
    pub async fn replace_categories(&self, categories: &[Category]) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn().transaction().await.map_err(db_err)?;

        if let Err(e) = tx.execute("DELETE FROM categories", params![]).await {
            tx.rollback().await.map_err(db_err)?;
            return Err(db_err(e));
        }

        for category in categories.iter().filter(|c| c.page_count > 0) {
            let count = i64::try_from(category.page_count).map_err(|_| {
                WikidexError::validation(format!("page count overflow for '{}'", category.name))
            });
            let inserted = match count {
                Ok(count) => tx
                    .execute(
                        "INSERT INTO categories (name, page_count) VALUES (?1, ?2)",
                        params![category.name.as_str(), count],
                    )
                    .await
                    .map_err(db_err),
                Err(e) => Err(e),
            };
            if let Err(e) = inserted {
                warn!(category = %category.name, error = %e, "category write failed, rolling back");
                tx.rollback().await.map_err(db_err)?;
                return Err(e);
            }
        }

        tx.commit().await.map_err(db_err)?;
        debug!(count = categories.len(), "category table replaced");
        Ok(())
    }

    /// All materialized categories, sorted by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, page_count FROM categories ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            categories.push(Category {
                name: row.get::<String>(0).map_err(db_err)?,
                page_count: row.get::<i64>(1).map_err(db_err)?.max(0) as u64,
            });
        }
        Ok(categories)
    }

    /// Titles of documents listing exactly `name` among their categories, sorted.
    pub async fn pages_in_category(&self, name: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT d.title FROM documents d
                 WHERE EXISTS (SELECT 1 FROM json_each(d.categories) WHERE value = ?1)
                 ORDER BY d.title",
                params![name.trim()],
            )
            .await
            .map_err(db_err)?;

        let mut titles = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            titles.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(titles)
    }
}
