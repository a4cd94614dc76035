//! Sumi-Gather main entry point
//!
//! This is the command-line interface for the Sumi-Gather page harvester.

use clap::Parser;
use std::path::PathBuf;
use sumi_gather::config::{load_config_with_hash, validate, Config};
use sumi_gather::crawler::Coordinator;
use sumi_gather::frontier::{load_url_list, FrontierFiles};
use sumi_gather::storage::{RunStatus, SqliteStorage};
use sumi_gather::url::{normalize_url, registrable_domain, url_registrable_domain};
use tracing_subscriber::EnvFilter;

/// Sumi-Gather: a polite single-domain page harvester
///
/// Sumi-Gather crawls every page of one registrable domain while respecting
/// robots.txt and request quotas, stores the title, text and publication date
/// of each page, and resumes interrupted crawls from its on-disk frontier.
#[derive(Parser, Debug)]
#[command(name = "sumi-gather")]
#[command(version)]
#[command(about = "A polite single-domain page harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the seed URL
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Override the number of workers
    #[arg(long, value_name = "N")]
    threads: Option<u32>,

    /// Override the project name
    #[arg(long, value_name = "NAME")]
    project: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, discarding the persisted frontier
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_json"])]
    dry_run: bool,

    /// Show statistics from the page store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_json"])]
    stats: bool,

    /// Write all stored records to data.json and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if apply_overrides(&mut config, &cli) {
        if let Err(e) = validate(&config) {
            tracing::error!("Invalid command-line override: {}", e);
            return Err(e.into());
        }
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_json {
        handle_export_json(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_gather=info,warn"),
            1 => EnvFilter::new("sumi_gather=debug,info"),
            2 => EnvFilter::new("sumi_gather=trace,debug"),
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

/// Replaces config values given on the command line; returns true if any were
fn apply_overrides(config: &mut Config, cli: &Cli) -> bool {
    let mut changed = false;
    if let Some(seed) = &cli.seed {
        config.crawl.seed_url = seed.clone();
        changed = true;
    }
    if let Some(threads) = cli.threads {
        config.crawl.threads = threads;
        changed = true;
    }
    if let Some(project) = &cli.project {
        config.project.name = project.clone();
        changed = true;
    }
    changed
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sumi-Gather Dry Run ===\n");

    let seed = normalize_url(&config.crawl.seed_url)?;
    let scope = match &config.crawl.domain {
        Some(domain) => registrable_domain(domain),
        None => url_registrable_domain(&seed).unwrap_or_default(),
    };

    println!("Crawl Configuration:");
    println!("  Project: {}", config.project.name);
    println!("  Project directory: {}", config.project_dir().display());
    println!("  Seed: {}", seed);
    println!("  Scope domain: {}", scope);
    println!("  Workers: {}", config.crawl.threads);
    println!("  Request timeout: {}s", config.crawl.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Pool size: {}", config.user_agent.pool.len());

    println!("\nPoliteness:");
    println!(
        "  Requests: {}/min, {}/day",
        config.politeness.requests_per_minute, config.politeness.requests_per_day
    );
    println!(
        "  Jitter: {}-{}ms",
        config.politeness.jitter_min_ms, config.politeness.jitter_max_ms
    );
    println!("  Robots.txt unavailable: {:?}", config.robots.on_failure);

    println!("\nSummarization:");
    if config.summarization.enabled {
        println!("  Model: {}", config.summarization.model);
        println!("  API key variable: {}", config.summarization.api_key_env);
    } else {
        println!("  Disabled");
    }

    let files = FrontierFiles::new(config.queue_path(), config.crawled_path());
    println!("\nFrontier:");
    if files.exist() {
        let queued = load_url_list(&files.queue)?.len();
        let crawled = load_url_list(&files.crawled)?.len();
        println!("  Would resume with {} queued and {} crawled URLs", queued, crawled);
    } else {
        println!("  No persisted frontier; would start from the seed");
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the page store
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use sumi_gather::output::{load_statistics, print_statistics};

    let path = config.database_path();
    println!("Database: {}\n", path.display());

    let storage = SqliteStorage::new(&path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-json mode: writes every stored record to data.json
fn handle_export_json(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use sumi_gather::output::export_json;

    println!("=== Exporting Page Records ===\n");
    println!("Database: {}", config.database_path().display());
    println!("Output: {}", config.export_path().display());
    println!();

    let storage = SqliteStorage::new(&config.database_path())?;
    let count = export_json(&storage, &config.export_path())?;

    println!("✓ Exported {} records to: {}", count, config.export_path().display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding persisted frontier)");
    } else {
        tracing::info!("Starting crawl (will resume from persisted frontier if present)");
    }

    let coordinator = match Coordinator::new(config, config_hash, fresh).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Crawl setup failed: {}", e);
            return Err(e.into());
        }
    };

    let interrupt = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            interrupt.request_shutdown();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            match summary.status {
                RunStatus::Completed => tracing::info!(
                    "Crawl completed: {} pages processed, {} records stored",
                    summary.processed,
                    summary.stored
                ),
                _ => tracing::info!(
                    "Crawl interrupted with {} URLs queued; run again to resume",
                    summary.frontier.pending + summary.frontier.in_flight
                ),
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
