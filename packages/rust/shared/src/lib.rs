//! Shared types, error model, and configuration for wikidex.
//!
//! This crate is the foundation depended on by all other wikidex crates.
//! It provides:
//! - [`WikidexError`], the unified error type
//! - Domain types ([`RawPage`], [`NewDocument`], [`Document`], [`Category`], [`SearchResult`])
//! - Configuration ([`AppConfig`], [`SearchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, MAX_SNIPPET_TOKENS, NormalizeConfig, SearchConfig, StorageConfig, WikiConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{Result, WikidexError};
pub use types::{
    Category, Document, NewDocument, RawPage, SearchResult, dedupe_categories, title_key,
};
