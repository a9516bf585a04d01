//! Application configuration for wikidex.
//!
//! User config lives at `~/.wikidex/wikidex.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, WikidexError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikidex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikidex";

/// FTS5 refuses snippet windows larger than this.
pub const MAX_SNIPPET_TOKENS: u32 = 64;

// ---------------------------------------------------------------------------
// Config structs (matching wikidex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source wiki settings.
    #[serde(default)]
    pub wiki: WikiConfig,

    /// Markup normalization bounds.
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Ranking and snippet settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. A leading `~` expands to the home dir.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    /// Database path with `~` expanded.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.wikidex/wikidex.db".into()
}

/// `[wiki]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Article URL prefix. Document URLs are this joined with the title.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://wiki.example.org/wiki/".into()
}

/// `[normalize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Upper bound on template resolution passes.
    #[serde(default = "default_max_template_passes")]
    pub max_template_passes: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_template_passes: default_max_template_passes(),
        }
    }
}

fn default_max_template_passes() -> usize {
    50
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned when the caller gives no limit.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Hard cap on results per query.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// bm25 weight of the title column.
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    /// bm25 weight of the content column.
    #[serde(default = "default_body_weight")]
    pub body_weight: f64,

    /// Snippet window in tokens.
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: u32,

    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,

    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,

    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,

    /// Match documents containing any token instead of all tokens.
    #[serde(default)]
    pub match_any: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            title_weight: default_title_weight(),
            body_weight: default_body_weight(),
            snippet_tokens: default_snippet_tokens(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
            ellipsis: default_ellipsis(),
            match_any: false,
        }
    }
}

fn default_limit() -> u32 {
    5
}
fn default_max_limit() -> u32 {
    50
}
fn default_title_weight() -> f64 {
    10.0
}
fn default_body_weight() -> f64 {
    1.0
}
fn default_snippet_tokens() -> u32 {
    32
}
fn default_highlight_open() -> String {
    "**".into()
}
fn default_highlight_close() -> String {
    "**".into()
}
fn default_ellipsis() -> String {
    "...".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject values the rest of the system cannot honour.
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.default_limit == 0 {
            return Err(WikidexError::config("search.default_limit must be at least 1"));
        }
        if search.max_limit < search.default_limit {
            return Err(WikidexError::config(
                "search.max_limit must be >= search.default_limit",
            ));
        }
        if search.snippet_tokens == 0 || search.snippet_tokens > MAX_SNIPPET_TOKENS {
            return Err(WikidexError::config(format!(
                "search.snippet_tokens must be between 1 and {MAX_SNIPPET_TOKENS}"
            )));
        }
        for (name, weight) in [
            ("title_weight", search.title_weight),
            ("body_weight", search.body_weight),
        ] {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(WikidexError::config(format!(
                    "search.{name} must be a positive number"
                )));
            }
        }
        if self.normalize.max_template_passes == 0 {
            return Err(WikidexError::config(
                "normalize.max_template_passes must be at least 1",
            ));
        }
        Url::parse(&self.wiki.base_url).map_err(|e| {
            WikidexError::config(format!("wiki.base_url '{}': {e}", self.wiki.base_url))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikidex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WikidexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikidex/wikidex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WikidexError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        WikidexError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikidexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikidexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikidexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| WikidexError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
