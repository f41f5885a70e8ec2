//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest scraper.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config, SinkConfig};
use catalog_harvest::crawler::{Harvester, LinkEnumerator};
use catalog_harvest::extract::{ExtractionMode, Extractor, RunTimestamp};
use catalog_harvest::output::{artifact_key, print_report, RunOutcome};
use catalog_harvest::HarvestError;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a paginated catalog scraper
///
/// Catalog-Harvest walks the listing pages of a catalog site, extracts one
/// record per entity detail page and persists the table as a CSV artifact.
///
/// Exit codes: 0 complete, 2 partial data loss, 3 persistence failure,
/// 1 any other error.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version)]
#[command(about = "A paginated catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,

    /// Extraction mode, overriding the configured one
    #[arg(long, value_enum)]
    mode: Option<ExtractionMode>,

    /// Listing page bound, overriding the configured one
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            tracing::error!("{:#}", e);
            let outcome = e
                .downcast_ref::<HarvestError>()
                .map(RunOutcome::from_error)
                .unwrap_or(RunOutcome::Fatal);
            ExitCode::from(outcome.exit_code())
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(mode) = cli.mode {
        config.extract.mode = mode;
    }
    if let Some(max_pages) = cli.max_pages {
        config.catalog.max_pages = max_pages;
    }

    if cli.dry_run {
        handle_dry_run(&config, &config_hash)?;
        return Ok(RunOutcome::Complete);
    }

    let harvester = Harvester::from_config(config)
        .context("Failed to initialise harvester")?
        .with_config_hash(config_hash);
    let report = harvester.run().await.context("Harvest failed")?;

    if !cli.quiet {
        print_report(&report);
    }
    Ok(report.outcome())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let enumerator =
        LinkEnumerator::new(&config.catalog).context("Catalog URLs do not resolve")?;
    let extractor = Extractor::new(&config.extract).context("Selectors do not compile")?;

    println!("=== Catalog-Harvest Dry Run ===\n");
    println!("Config hash: {}", config_hash);

    println!("\nCatalog:");
    println!("  Base URL: {}", config.catalog.base_url);
    println!("  First listing page: {}", enumerator.page_url(0));
    println!("  Detail marker: {}", config.catalog.detail_marker);
    println!("  Max pages: {}", config.catalog.max_pages);
    println!(
        "  Exhausted at <= {} links per page",
        config.catalog.exhaustion_threshold
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Request delay: {}ms", config.fetch.request_delay_ms);
    println!(
        "  Retries: {} ({}ms apart)",
        config.fetch.max_retries, config.fetch.retry_delay_ms
    );
    println!("  Concurrency: {}", config.fetch.concurrency);
    println!("  Respect robots.txt: {}", config.fetch.respect_robots);

    println!("\nExtraction:");
    println!("  Mode: {}", extractor.mode());
    println!("  Columns: {}", extractor.mode().schema());
    println!("  Escalate after: {} consecutive failures", config.extract.escalate_after);

    let key = artifact_key(
        &config.output.artifact_prefix,
        config.extract.mode,
        RunTimestamp::now(),
    );
    println!("\nOutput:");
    println!(
        "  Artifact: {}",
        Path::new(&config.output.directory).join(&key).display()
    );
    match &config.sink {
        SinkConfig::S3(s3) => {
            println!("  Sink: bucket {}", s3.bucket);
            if let Some(endpoint) = &s3.endpoint {
                println!("  Endpoint: {}", endpoint);
            }
            println!("  Credentials: {}", s3.credentials_path);
        }
        SinkConfig::Local(local) => println!("  Sink: directory {}", local.directory),
    }

    println!("\nDry run complete. No pages fetched.");
    Ok(())
}
