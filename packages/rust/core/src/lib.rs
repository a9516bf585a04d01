//! Search, category aggregation and ingest orchestration for wikidex.
//!
//! This crate ties the markup normalizer and the document store together:
//! [`ingest::ingest_pages`] turns raw pages into stored documents,
//! [`search::SearchEngine`] ranks them, and
//! [`categories::CategoryAggregator`] keeps the category counts current.

pub mod categories;
pub mod ingest;
pub mod search;

pub use categories::{CategoryAggregator, RefreshSummary};
pub use ingest::{IngestConfig, IngestReport, ProgressReporter, SilentProgress, ingest_pages};
pub use search::{SearchEngine, sanitize_query};
