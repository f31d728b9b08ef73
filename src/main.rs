//! Subreddit Scanner main entry point
//!
//! This is the command-line interface for the subreddit metadata scanner.

use anyhow::Context;
use clap::{Args, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use subreddit_scanner::client::ApiClient;
use subreddit_scanner::config::{load_config_with_hash, load_credentials, validate, Config, Overrides};
use subreddit_scanner::limiter::{RateLimiter, WindowLimits};
use subreddit_scanner::output::{
    describe_outcome, load_statistics, print_compact_report, print_dedupe_report,
    print_run_summary, print_statistics,
};
use subreddit_scanner::scanner::{dedupe_list, RunSummary, Scanner};
use subreddit_scanner::storage::{open_storage, SqliteStorage, Storage};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit code for a run stopped by SIGINT/SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

/// Subreddit Scanner: a paced subreddit metadata crawler
///
/// Fetches subreddit metadata from the Reddit API under strict rate limits
/// and stores it in a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "subreddit-scanner")]
#[command(version = "1.0.0")]
#[command(about = "A paced, rate-limited subreddit metadata scanner", long_about = None)]
struct Cli {
    #[command(flatten)]
    mode: Mode,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load API credentials from this file instead of ./.env
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Database path
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Work list (CSV) path
    #[arg(long, value_name = "PATH")]
    list: Option<String>,

    /// Maximum number of items to process
    #[arg(long)]
    limit: Option<usize>,

    /// Requests per minute
    #[arg(long, value_name = "PER_MINUTE")]
    rate_limit: Option<usize>,

    /// Seconds to wait after each item
    #[arg(long, value_name = "SECONDS")]
    cooldown: Option<f64>,

    /// Only refresh NSFW subreddits
    #[arg(long)]
    nsfw_only: bool,
}

/// Run modes, exactly one of which is required
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Mode {
    /// Scan new subreddits from the work list
    #[arg(long)]
    scan_list: bool,

    /// Refresh stale subreddits already in the database
    #[arg(long)]
    refresh: bool,

    /// Repair inconsistent rows and compact the database
    #[arg(long)]
    compact: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Remove work list rows that are repeated or already in the database
    #[arg(long)]
    dedupe_list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    match run(cli, cancel.clone()).await {
        Ok(()) if cancel.is_cancelled() => ExitCode::from(EXIT_INTERRUPTED),
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            if cancel.is_cancelled() {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("subreddit_scanner=info,warn"),
            1 => EnvFilter::new("subreddit_scanner=debug,info"),
            2 => EnvFilter::new("subreddit_scanner=trace,debug"),
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

/// Cancels `cancel` on the first SIGINT or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing the current item...");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = load_configuration(&cli)?;

    if cli.mode.stats {
        handle_stats(&config)
    } else if cli.mode.compact {
        handle_compact(&config)
    } else if cli.mode.dedupe_list {
        handle_dedupe(&config)
    } else if cli.mode.refresh {
        let mut scanner = build_scanner(&config, cli.env_file.as_deref(), cancel).await?;
        let summary = scanner
            .run_refresh(cli.limit, cli.nsfw_only)
            .await
            .context("Refresh failed")?;
        report(&scanner, &summary).await;
        Ok(())
    } else {
        let mut scanner = build_scanner(&config, cli.env_file.as_deref(), cancel).await?;
        let summary = scanner
            .run_list_scan(Path::new(&config.work_list.path), cli.limit)
            .await
            .context("List scan failed")?;
        report(&scanner, &summary).await;
        Ok(())
    }
}

/// Loads the file (if any), applies command-line overrides and validates
fn load_configuration(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    config.apply_overrides(&Overrides {
        database_path: cli.db.clone(),
        list_path: cli.list.clone(),
        rate_limit_per_minute: cli.rate_limit,
        cooldown_secs: cli.cooldown,
    });
    validate(&config).context("Invalid configuration")?;
    tracing::debug!("{}", config);

    Ok(config)
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Wires storage, limiter and an authenticated client into a scanner
async fn build_scanner(
    config: &Config,
    env_file: Option<&Path>,
    cancel: CancellationToken,
) -> anyhow::Result<Scanner<SqliteStorage>> {
    let credentials = load_credentials(env_file)?;
    let storage = open_database(config)?;
    let limiter = Arc::new(RateLimiter::new(WindowLimits::from(&config.rate_limit)));
    let client = ApiClient::new(&config.api, &config.pacing, credentials, limiter)?;

    let mut scanner = Scanner::new(config.clone(), storage, client, cancel);
    scanner
        .initialize()
        .await
        .context("Failed to initialize Reddit API client")?;
    Ok(scanner)
}

async fn report(scanner: &Scanner<SqliteStorage>, summary: &RunSummary) {
    tracing::info!("Run {}", describe_outcome(&summary.outcome));
    let limiter = scanner.client().limiter().stats().await;
    print_run_summary(summary, &scanner.client().stats(), &limiter);
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage, config.storage.stale_days)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --compact mode: repairs rows, then reclaims space
fn handle_compact(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let fixed = storage.fix_inconsistent_states()?;
    let compacted = storage.compact()?;
    print_compact_report(&fixed, &compacted);
    Ok(())
}

/// Handles the --dedupe-list mode: offline, no credentials needed
fn handle_dedupe(config: &Config) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let path = Path::new(&config.work_list.path);
    let report = dedupe_list(&storage, path, config.work_list.sort_by_popularity)
        .with_context(|| format!("Failed to dedupe {}", path.display()))?;
    print_dedupe_report(&report);
    Ok(())
}
