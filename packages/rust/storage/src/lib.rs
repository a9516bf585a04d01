//! libSQL storage layer for wikidex documents, categories, and full-text search.
//!
//! The [`Storage`] struct wraps a libSQL database. Documents are keyed by
//! their lowercased title; an FTS5 table over title and content is kept in
//! sync by triggers, so every write that lands in `documents` has already
//! updated the index when the statement returns.
//!
//! **Access rules:**
//! - Ingest: read-write (sole writer) via [`Storage::open`]
//! - Search and browse: read-only via [`Storage::open_readonly`]

mod categories;
mod fts;
mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument, warn};

use wikidex_shared::{Document, NewDocument, Result, WikidexError, dedupe_categories, title_key};

pub use fts::{IndexHit, IndexQuery};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Map a libSQL error into the storage variant.
pub(crate) fn db_err(e: libsql::Error) -> WikidexError {
    WikidexError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikidexError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WikidexError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                let tx = self.conn.transaction().await.map_err(db_err)?;
                tx.execute_batch(migration.sql).await.map_err(|e| {
                    WikidexError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
                tx.commit().await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(WikidexError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------------
    // Document writes
    // -----------------------------------------------------------------------

    /// Insert or replace a document, keyed by case-insensitive title.
    ///
    /// On conflict everything but the stored title spelling is overwritten
    /// and `indexed_at` is refreshed.
    pub async fn upsert_document(&self, doc: &NewDocument) -> Result<()> {
        self.check_writable()?;
        let indexed_at = Utc::now().to_rfc3339();
        write_document(&self.conn, doc, &indexed_at).await
    }

    /// Upsert a batch of documents in one transaction.
    ///
    /// Either every document lands or none does; the first failure rolls the
    /// whole batch back and is returned. Returns the number written.
    #[instrument(skip_all, fields(batch = docs.len()))]
    pub async fn upsert_documents(&self, docs: &[NewDocument]) -> Result<usize> {
        self.check_writable()?;
        let indexed_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(db_err)?;

        for (index, doc) in docs.iter().enumerate() {
            let written = write_document(&tx, doc, &indexed_at).await;
            if let Err(e) = written {
                warn!(index, title = %doc.title, error = %e, "batch write failed, rolling back");
                tx.rollback().await.map_err(db_err)?;
                return Err(e);
            }
        }

        tx.commit().await.map_err(db_err)?;
        info!(count = docs.len(), "document batch committed");
        Ok(docs.len())
    }

    /// Delete a document. Returns whether one existed.
    pub async fn remove_document(&self, title: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "DELETE FROM documents WHERE title_key = ?1",
                params![title_key(title)],
            )
            .await
            .map_err(db_err)?;
        debug!(title, removed = affected > 0, "remove document");
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Document reads
    // -----------------------------------------------------------------------

    /// Look up a document by title, ignoring case.
    pub async fn get_document(&self, title: &str) -> Result<Option<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT title, content, url, categories, last_modified, indexed_at
                 FROM documents WHERE title_key = ?1",
                params![title_key(title)],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// All document titles in lexicographic order.
    pub async fn all_titles(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT title FROM documents ORDER BY title", params![])
            .await
            .map_err(db_err)?;

        let mut titles = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            titles.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(titles)
    }

    /// When the document was last written, if it exists.
    pub async fn scraped_at(&self, title: &str) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT indexed_at FROM documents WHERE title_key = ?1",
                params![title_key(title)],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let s: String = row.get(0).map_err(db_err)?;
                Ok(Some(parse_timestamp(&s)?))
            }
            None => Ok(None),
        }
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// The category list of every stored document, in no particular order.
    pub async fn document_categories(&self) -> Result<Vec<Vec<String>>> {
        let mut rows = self
            .conn
            .query("SELECT categories FROM documents", params![])
            .await
            .map_err(db_err)?;

        let mut all = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let json: String = row.get(0).map_err(db_err)?;
            all.push(decode_categories(&json)?);
        }
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Validate and write one document on `conn` (a plain connection or a transaction).
async fn write_document(conn: &Connection, doc: &NewDocument, indexed_at: &str) -> Result<()> {
    let title = doc.title.trim();
    if title.is_empty() {
        return Err(WikidexError::validation("document title is empty"));
    }

    let categories = dedupe_categories(&doc.categories);
    let categories_json = serde_json::to_string(&categories)
        .map_err(|e| WikidexError::Storage(format!("encode categories: {e}")))?;

    conn.execute(
        "INSERT INTO documents (title_key, title, content, url, categories, last_modified, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(title_key) DO UPDATE SET
           content = excluded.content,
           url = excluded.url,
           categories = excluded.categories,
           last_modified = excluded.last_modified,
           indexed_at = excluded.indexed_at",
        params![
            title_key(title),
            title,
            doc.content.as_str(),
            doc.url.as_str(),
            categories_json,
            doc.last_modified.map(|t| t.to_rfc3339()),
            indexed_at,
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Convert a `title, content, url, categories, last_modified, indexed_at` row.
fn row_to_document(row: &libsql::Row) -> Result<Document> {
    Ok(Document {
        title: row.get::<String>(0).map_err(db_err)?,
        content: row.get::<String>(1).map_err(db_err)?,
        url: row.get::<String>(2).map_err(db_err)?,
        categories: decode_categories(&row.get::<String>(3).map_err(db_err)?)?,
        last_modified: row
            .get::<Option<String>>(4)
            .map_err(db_err)?
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        indexed_at: parse_timestamp(&row.get::<String>(5).map_err(db_err)?)?,
    })
}

pub(crate) fn decode_categories(json: &str) -> Result<Vec<String>> {
    serde_json::from_str(json)
        .map_err(|e| WikidexError::Storage(format!("invalid categories column: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WikidexError::Storage(format!("invalid date: {e}")))
}
