//! CLI command definitions, routing, and tracing setup.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use wikidex_core::ingest::read_pages;
use wikidex_core::{
    CategoryAggregator, IngestConfig, IngestReport, ProgressReporter, SearchEngine, ingest_pages,
};
use wikidex_markup::{NormalizeOptions, normalize_with};
use wikidex_shared::{AppConfig, init_config, load_config, load_config_from};
use wikidex_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// wikidex: searchable plain text from wiki markup.
#[derive(Parser)]
#[command(
    name = "wikidex",
    version,
    about = "Normalize wiki markup into plain text and search it with ranked full-text queries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Database file (overrides storage.database_path).
    #[arg(long, env = "WIKIDEX_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ~/.wikidex/wikidex.toml).
    #[arg(long, env = "WIKIDEX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Normalize and store pages from a JSON-lines file, then refresh categories.
    Ingest {
        /// One page per line: {"title", "markup", "categories", "last_modified"}.
        file: PathBuf,
    },

    /// Print the plain text of wiki markup read from a file or stdin.
    Normalize {
        /// Markup file; `-` or omitted reads stdin.
        file: Option<PathBuf>,
    },

    /// Ranked full-text search.
    Search {
        /// Search terms.
        query: String,

        /// Maximum results (clamped to search.max_limit).
        #[arg(short, long)]
        limit: Option<u32>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one document by title (case-insensitive).
    Get {
        title: String,

        /// Print the document as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List every stored title.
    Titles,

    /// List categories with their page counts.
    Categories {
        /// Recompute counts from stored documents first.
        #[arg(long)]
        refresh: bool,
    },

    /// List the pages in a category.
    Pages {
        category: String,
    },

    /// Delete a document by title.
    Remove {
        title: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "wikidex=info",
        1 => "wikidex=debug",
        _ => "wikidex=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        db,
        config: config_path,
        command,
        ..
    } = cli;

    let resolve = || -> Result<(AppConfig, PathBuf)> {
        let config = resolve_config(config_path.as_deref())?;
        let db_path = match &db {
            Some(path) => path.clone(),
            None => config.storage.resolved_database_path()?,
        };
        Ok((config, db_path))
    };

    match command {
        Command::Ingest { file } => {
            let (config, db_path) = resolve()?;
            cmd_ingest(&config, &db_path, &file).await
        }
        Command::Normalize { file } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_normalize(&config, file.as_deref())
        }
        Command::Search { query, limit, json } => {
            let (config, db_path) = resolve()?;
            cmd_search(&config, &db_path, &query, limit, json).await
        }
        Command::Get { title, json } => cmd_get(&resolve()?.1, &title, json).await,
        Command::Titles => cmd_titles(&resolve()?.1).await,
        Command::Categories { refresh } => cmd_categories(&resolve()?.1, refresh).await,
        Command::Pages { category } => cmd_pages(&resolve()?.1, &category).await,
        Command::Remove { title } => cmd_remove(&resolve()?.1, &title).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// Load the config from `path`, or the default location when none is given.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(config: &AppConfig, db_path: &Path, file: &Path) -> Result<()> {
    let handle = std::fs::File::open(file)
        .map_err(|e| eyre!("cannot open '{}': {e}", file.display()))?;
    let pages = read_pages(BufReader::new(handle))?;
    if pages.is_empty() {
        warn!(file = %file.display(), "no pages found");
        return Ok(());
    }

    let ingest_config = IngestConfig::from_app_config(config)?;
    let storage = Storage::open(db_path).await?;

    info!(
        file = %file.display(),
        pages = pages.len(),
        db = %db_path.display(),
        "ingesting pages"
    );

    let reporter = CliProgress::new()?;
    let report = ingest_pages(&storage, &pages, &ingest_config, &reporter).await;
    if report.is_err() {
        reporter.spinner.finish_and_clear();
    }
    let report = report?;

    println!();
    println!("  Ingest complete!");
    println!("  Documents:  {}", report.documents);
    println!("  Categories: {}", report.categories);
    if !report.capped.is_empty() {
        println!("  Capped:     {}", report.capped.join(", "));
    }
    println!("  Database:   {}", db_path.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_normalize(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let normalized = normalize_with(&raw, &NormalizeOptions::from(&config.normalize));
    if normalized.capped {
        warn!(
            passes = normalized.template_passes,
            "template pass cap reached, output may be incomplete"
        );
    }
    println!("{}", normalized.text);
    Ok(())
}

async fn cmd_search(
    config: &AppConfig,
    db_path: &Path,
    query: &str,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    let engine = SearchEngine::new(&storage, config.search.clone());
    let results = engine.search(query, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for '{query}'.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{:>2}. {} ({:.3})", i + 1, result.title, result.relevance_score);
        println!("    {}", result.url);
        if !result.snippet.is_empty() {
            println!("    {}", result.snippet.replace('\n', " "));
        }
        println!();
    }
    Ok(())
}

async fn cmd_get(db_path: &Path, title: &str, json: bool) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    let doc = storage
        .get_document(title)
        .await?
        .ok_or_else(|| eyre!("no document titled '{title}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("# {}", doc.title);
    println!("URL:        {}", doc.url);
    if !doc.categories.is_empty() {
        println!("Categories: {}", doc.categories.join(", "));
    }
    if let Some(modified) = doc.last_modified {
        println!("Modified:   {}", modified.to_rfc3339());
    }
    println!("Indexed:    {}", doc.indexed_at.to_rfc3339());
    println!();
    println!("{}", doc.content);
    Ok(())
}

async fn cmd_titles(db_path: &Path) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    for title in storage.all_titles().await? {
        println!("{title}");
    }
    Ok(())
}

async fn cmd_categories(db_path: &Path, refresh: bool) -> Result<()> {
    let storage = if refresh {
        Storage::open(db_path).await?
    } else {
        Storage::open_readonly(db_path).await?
    };
    let aggregator = CategoryAggregator::new(&storage);

    if refresh {
        let summary = aggregator.refresh().await?;
        info!(categories = summary.categories, "categories refreshed");
    }

    let categories = aggregator.list_categories().await?;
    if categories.is_empty() {
        println!("No categories. Run `wikidex categories --refresh` after ingesting.");
        return Ok(());
    }
    for category in categories {
        println!("{:>6}  {}", category.page_count, category.name);
    }
    Ok(())
}

async fn cmd_pages(db_path: &Path, category: &str) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    let titles = CategoryAggregator::new(&storage)
        .pages_in_category(category)
        .await?;
    if titles.is_empty() {
        println!("No pages in category '{category}'.");
    }
    for title in titles {
        println!("{title}");
    }
    Ok(())
}

async fn cmd_remove(db_path: &Path, title: &str) -> Result<()> {
    let storage = Storage::open(db_path).await?;
    if !storage.remove_document(title).await? {
        return Err(eyre!("no document titled '{title}'"));
    }
    CategoryAggregator::new(&storage).refresh().await?;
    println!("Removed '{title}'.");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_normalized(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Normalizing [{current}/{total}] {title}"));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}
