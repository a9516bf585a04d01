//! Ingest pipeline: raw pages → normalized documents → store → category counts.

use std::io::BufRead;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use url::Url;

use wikidex_markup::{NormalizeOptions, normalize_with};
use wikidex_shared::{AppConfig, NewDocument, RawPage, Result, WikidexError};
use wikidex_storage::Storage;

use crate::categories::CategoryAggregator;

/// Configuration for [`ingest_pages`].
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Document URLs are this base plus the title with spaces as `_`.
    pub base_url: Url,
    pub normalize: NormalizeOptions,
}

impl IngestConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.wiki.base_url).map_err(|e| {
            WikidexError::config(format!("wiki.base_url '{}': {e}", config.wiki.base_url))
        })?;
        Ok(Self {
            base_url,
            normalize: NormalizeOptions::from(&config.normalize),
        })
    }
}

/// Result of an ingest run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Documents written.
    pub documents: usize,
    /// Titles whose templates hit the pass cap.
    pub capped: Vec<String>,
    /// Categories after the refresh.
    pub categories: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting ingest status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page is normalized.
    fn page_normalized(&self, title: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_normalized(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &IngestReport) {}
}

/// Normalize `pages`, store them as one batch, and refresh category counts.
///
/// The batch is atomic: if any page cannot be stored (an empty title, for
/// instance) nothing is written and the error is returned.
#[instrument(skip_all, fields(pages = pages.len()))]
pub async fn ingest_pages(
    storage: &Storage,
    pages: &[RawPage],
    config: &IngestConfig,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let start = Instant::now();
    info!(pages = pages.len(), "starting ingest");

    // --- Phase 1: Normalize ---
    progress.phase("Normalizing pages");
    let mut documents = Vec::with_capacity(pages.len());
    let mut capped = Vec::new();

    for (i, page) in pages.iter().enumerate() {
        let normalized = normalize_with(&page.markup, &config.normalize);
        if normalized.capped {
            warn!(
                title = %page.title,
                passes = normalized.template_passes,
                "template pass cap reached, output may be incomplete"
            );
            capped.push(page.title.clone());
        }

        documents.push(NewDocument {
            title: page.title.clone(),
            content: normalized.text,
            url: document_url(&config.base_url, &page.title)?,
            categories: page.categories.clone(),
            last_modified: page.last_modified,
        });
        progress.page_normalized(&page.title, i + 1, pages.len());
    }

    // --- Phase 2: Store ---
    progress.phase("Writing documents");
    let written = storage.upsert_documents(&documents).await?;

    // --- Phase 3: Categories ---
    progress.phase("Refreshing categories");
    let summary = CategoryAggregator::new(storage).refresh().await?;

    let report = IngestReport {
        documents: written,
        capped,
        categories: summary.categories,
        elapsed: start.elapsed(),
    };

    info!(
        documents = report.documents,
        capped = report.capped.len(),
        categories = report.categories,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "ingest complete"
    );
    progress.done(&report);

    Ok(report)
}

/// Public URL of a page: `base` with the title appended as path segments,
/// spaces replaced by `_`.
pub fn document_url(base: &Url, title: &str) -> Result<String> {
    let slug = title.trim().replace(' ', "_");
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| WikidexError::config(format!("wiki.base_url '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(slug.split('/'));
    Ok(url.to_string())
}

/// Read pages from JSON lines, one [`RawPage`] object per line. Blank
/// lines are skipped.
pub fn read_pages(reader: impl BufRead) -> Result<Vec<RawPage>> {
    let mut pages = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| WikidexError::parse(format!("line {}: {e}", index + 1)))?;
        if line.trim().is_empty() {
            continue;
        }
        let page: RawPage = serde_json::from_str(&line)
            .map_err(|e| WikidexError::parse(format!("line {}: {e}", index + 1)))?;
        pages.push(page);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("wikidex_ingest_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn test_config() -> IngestConfig {
        IngestConfig {
            base_url: Url::parse("https://wiki.example.org/wiki/").unwrap(),
            normalize: NormalizeOptions::default(),
        }
    }

    fn page(title: &str, markup: &str, categories: &[&str]) -> RawPage {
        RawPage {
            title: title.into(),
            markup: markup.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            last_modified: None,
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn page_normalized(&self, title: &str, current: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("page:{title}:{current}/{total}"));
        }
        fn done(&self, report: &IngestReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{}", report.documents));
        }
    }

    #[test]
    fn url_from_title() {
        let base = Url::parse("https://wiki.example.org/wiki/").unwrap();
        assert_eq!(
            document_url(&base, "Fishing Rod").unwrap(),
            "https://wiki.example.org/wiki/Fishing_Rod"
        );
        assert_eq!(
            document_url(&base, "Category:Tools").unwrap(),
            "https://wiki.example.org/wiki/Category:Tools"
        );
        assert_eq!(
            document_url(&base, "Guide/Getting started").unwrap(),
            "https://wiki.example.org/wiki/Guide/Getting_started"
        );
    }

    #[test]
    fn url_base_without_trailing_slash() {
        let base = Url::parse("https://wiki.example.org/w").unwrap();
        assert_eq!(
            document_url(&base, "Cod").unwrap(),
            "https://wiki.example.org/w/Cod"
        );
    }

    #[test]
    fn config_from_app_config() {
        let config = IngestConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config.normalize, NormalizeOptions::default());
    }

    #[test]
    fn reads_json_lines() {
        let input = r#"{"title":"Cod","markup":"'''Cod''' is a [[fish]].","categories":["Fish"]}

{"title":"Salmon","markup":"A fish.","last_modified":"2024-03-01T12:00:00Z"}
"#;
        let pages = read_pages(input.as_bytes()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].categories, vec!["Fish"]);
        assert!(pages[1].categories.is_empty());
        assert_eq!(
            pages[1].last_modified,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn bad_json_line_reports_line_number() {
        let input = "{\"title\":\"Cod\",\"markup\":\"x\"}\nnot json\n";
        let err = read_pages(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[tokio::test]
    async fn ingest_normalizes_stores_and_counts() {
        let storage = test_storage().await;
        let pages = vec![
            page(
                "Cod",
                "'''Cod''' is a [[fish]].\n[[Category:Fish]]",
                &["Fish", "Food"],
            ),
            page("Fishing Rod", "{{quote|Cast away}} Used for [[Fishing|fishing]].", &["Tools"]),
        ];

        let progress = RecordingProgress::default();
        let report = ingest_pages(&storage, &pages, &test_config(), &progress)
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.categories, 3);
        assert!(report.capped.is_empty());

        let cod = storage.get_document("cod").await.unwrap().unwrap();
        assert_eq!(cod.content, "Cod is a fish.");
        assert_eq!(cod.url, "https://wiki.example.org/wiki/Cod");

        let rod = storage.get_document("Fishing Rod").await.unwrap().unwrap();
        assert_eq!(rod.content, "\"Cast away\" Used for fishing.");
        assert_eq!(rod.url, "https://wiki.example.org/wiki/Fishing_Rod");

        assert_eq!(storage.pages_in_category("Tools").await.unwrap(), vec!["Fishing Rod"]);

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(events.first().map(String::as_str), Some("phase:Normalizing pages"));
        assert!(events.contains(&"page:Fishing Rod:2/2".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done:2"));
    }

    #[tokio::test]
    async fn capped_titles_reported() {
        let storage = test_storage().await;
        let deep = format!("{}core{}", "{{t|".repeat(6), "}}".repeat(6));
        let config = IngestConfig {
            normalize: NormalizeOptions {
                max_template_passes: 2,
            },
            ..test_config()
        };

        let report = ingest_pages(&storage, &[page("Deep", &deep, &[])], &config, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.capped, vec!["Deep"]);
        let stored = storage.get_document("Deep").await.unwrap().unwrap();
        assert!(!stored.content.contains("{{"));
    }

    #[tokio::test]
    async fn invalid_page_writes_nothing() {
        let storage = test_storage().await;
        let pages = vec![page("Cod", "fish", &["Fish"]), page("  ", "nameless", &[])];
        let result = ingest_pages(&storage, &pages, &test_config(), &SilentProgress).await;
        assert!(result.is_err());
        assert_eq!(storage.count().await.unwrap(), 0);
        assert!(storage.list_categories().await.unwrap().is_empty());
    }
}
