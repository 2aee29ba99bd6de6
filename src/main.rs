//! Tweet Harvest main entry point
//!
//! This is the command-line interface for the Tweet Harvest timeline harvester.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tweet_harvest::config::{load_config_with_hash, Config};
use tweet_harvest::harvest::{harvest, output_path, HarvestOutcome, HarvestRequest, SearchTab, WriteMode};
use tweet_harvest::page::export_pages;

/// Tweet Harvest: an incremental-scroll timeline harvester
///
/// Scrolls a search timeline or a conversation thread in an authenticated
/// browser session and appends every record it sees to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "tweet-harvest")]
#[command(version)]
#[command(about = "Harvest tweets from search results or threads into CSV", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Twitter auth token (the `auth_token` cookie)
    #[arg(short, long, env = "TWITTER_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Search keywords
    #[arg(short, long, conflicts_with_all = ["thread_url", "extract_url"])]
    keyword: Option<String>,

    /// Conversation thread to harvest replies from
    #[arg(long, conflicts_with_all = ["keyword", "extract_url"])]
    thread_url: Option<String>,

    /// Only tweets since this date (DD-MM-YYYY or YYYY-MM-DD)
    #[arg(long, requires = "keyword")]
    from: Option<String>,

    /// Only tweets until this date (DD-MM-YYYY or YYYY-MM-DD)
    #[arg(long, requires = "keyword")]
    to: Option<String>,

    /// Number of records to collect
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Seconds to wait after saving a large batch
    #[arg(long, default_value_t = 3)]
    delay_each: u64,

    /// Seconds to wait each time 100 records have been saved
    #[arg(long, default_value_t = 10)]
    delay_every_100: u64,

    /// Output file name inside the output folder
    #[arg(short, long)]
    output_filename: Option<String>,

    /// Search tab to start with
    #[arg(long, value_enum, default_value_t = TabArg::Latest)]
    tab: TabArg,

    /// What to do with an existing output file
    #[arg(long, value_enum, default_value_t = CsvModeArg::Replace)]
    csv_mode: CsvModeArg,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Keep the browser open after the run for inspection
    #[arg(long)]
    debug: bool,

    /// Validate the request and show what would be harvested without launching a browser
    #[arg(long)]
    dry_run: bool,

    /// Fetch these pages and export their metadata instead of harvesting
    #[arg(long, value_name = "URL", num_args = 1..)]
    extract_url: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TabArg {
    Latest,
    Top,
}

impl From<TabArg> for SearchTab {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::Latest => SearchTab::Latest,
            TabArg::Top => SearchTab::Top,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CsvModeArg {
    Replace,
    Append,
}

impl From<CsvModeArg> for WriteMode {
    fn from(mode: CsvModeArg) -> Self {
        match mode {
            CsvModeArg::Replace => WriteMode::Replace,
            CsvModeArg::Append => WriteMode::Append,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => load(path)?,
        None => Config::default(),
    };
    if cli.headful {
        config.browser.headless = false;
    }
    if cli.debug {
        config.browser.keep_open = true;
    }

    if !cli.extract_url.is_empty() {
        return handle_extract(&config, &cli.extract_url).await;
    }

    let request = build_request(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config, &request);
        return Ok(());
    }

    handle_harvest(&config, request).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tweet_harvest=info,warn"),
            1 => EnvFilter::new("tweet_harvest=debug,info"),
            2 => EnvFilter::new("tweet_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load(path: &Path) -> anyhow::Result<Config> {
    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

fn build_request(cli: &Cli) -> anyhow::Result<HarvestRequest> {
    let Some(token) = cli.token.clone() else {
        bail!("an auth token is required (--token or TWITTER_AUTH_TOKEN)");
    };

    let mut request = HarvestRequest::from_parts(
        token,
        cli.keyword.clone(),
        cli.thread_url.as_deref(),
        cli.from.as_deref(),
        cli.to.as_deref(),
    )?;
    request.target_count = cli.limit;
    request.delay_each_secs = cli.delay_each;
    request.delay_batch_secs = cli.delay_every_100;
    request.output_filename = cli.output_filename.clone();
    request.tab = cli.tab.into();
    request.write_mode = cli.csv_mode.into();

    request.validate()?;
    Ok(request)
}

/// Handles the --dry-run mode: validates the request and shows what would be harvested
fn handle_dry_run(config: &Config, request: &HarvestRequest) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let output = output_path(Path::new(&config.output.folder), &request.output_stem(&timestamp));

    println!("=== Tweet Harvest Dry Run ===\n");
    println!("Request:");
    println!("  Mode: {}", request.mode());
    println!("  Target: {}", request.describe());
    println!("  Limit: {}", request.target_count);
    println!("  Start URL: {}", request.navigation_url(request.tab));
    println!("  Output: {}", output.display());

    println!("\nHarvest Loop:");
    println!("  Response timeout: {}ms", config.harvest.response_timeout_ms);
    println!("  Stall limit: {}", config.harvest.stall_limit);
    println!("  Recovery limit: {}", config.harvest.recovery_limit);
    println!(
        "  Rate-limit backoff: {}ms .. {}ms",
        config.backoff.base_ms, config.backoff.max_ms
    );

    println!("\n✓ Request is valid");
}

/// Handles the --extract-url mode: fetches pages and exports their metadata
async fn handle_extract(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let (json_path, csv_path) = export_pages(config, urls).await?;
    println!("✓ Pages exported to: {}", json_path.display());
    println!("✓ Pages exported to: {}", csv_path.display());
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, request: HarvestRequest) -> anyhow::Result<()> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current page");
            let _ = cancel_tx.send(true);
        }
    });

    let result = harvest(config, request, Some(cancel_rx))
        .await
        .context("harvest failed")?;

    match &result.outcome {
        HarvestOutcome::Aborted { reason } => {
            tracing::error!("Harvest stopped early: {}", reason)
        }
        outcome => tracing::info!("Harvest finished: {}", outcome),
    }

    let tabs: Vec<String> = result.used_tabs.iter().map(ToString::to_string).collect();
    println!("✓ {} records saved to: {}", result.total_records, result.file_path.display());
    println!("  Tabs used: {}", tabs.join(", "));

    Ok(())
}
