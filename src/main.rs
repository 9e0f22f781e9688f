//! Notion-Wiki main entry point
//!
//! This is the command-line interface for mirroring a Notion workspace into a
//! Markdown wiki.

use anyhow::Context;
use clap::Parser;
use notion_wiki::config::{load_config, Config};
use notion_wiki::output::print_summary;
use notion_wiki::pipeline::clear_cache;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Notion-Wiki: mirrors a Notion page tree into linked Markdown files
///
/// Notion-Wiki crawls a root page with all of its sub-pages and databases,
/// caches the API responses locally and writes one Markdown file per page,
/// database and database record, with internal links rewritten as relative
/// paths.
#[derive(Parser, Debug)]
#[command(name = "notion-wiki")]
#[command(version)]
#[command(about = "Mirror a Notion workspace into a Markdown wiki", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.toml", env = "NOTION_CONFIG_FILE")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore cached responses and fetch everything again
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be done without fetching anything
    #[arg(long, conflicts_with_all = ["clear_cache", "fresh"])]
    dry_run: bool,

    /// Remove all cached responses and exit
    #[arg(long, conflicts_with = "dry_run")]
    clear_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(cfg) => {
            tracing::info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context(format!("invalid configuration {}", cli.config.display()));
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.fresh);
    } else if cli.clear_cache {
        handle_clear_cache(&config)?;
    } else {
        handle_run(&config, cli.fresh, cli.quiet).await?;
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
            0 => EnvFilter::new("notion_wiki=info,warn"),
            1 => EnvFilter::new("notion_wiki=debug,info"),
            2 => EnvFilter::new("notion_wiki=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, fresh: bool) {
    println!("=== Notion-Wiki Dry Run ===\n");

    println!("Notion:");
    println!("  Root page: {}", config.notion.root_id);
    println!("  API: {}", config.notion.api_base_url);
    println!("  API version: {}", config.notion.notion_version);

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!(
        "  Minimum request interval: {}ms",
        config.crawler.min_request_interval_ms
    );
    println!(
        "  Retries: {} (base delay {}ms)",
        config.crawler.max_retries, config.crawler.retry_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nCache:");
    if config.cache.enabled {
        println!("  Directory: {}", config.cache.dir);
        println!("  TTL: {}s", config.cache.ttl_seconds);
        if fresh {
            println!("  Reads: disabled (--fresh)");
        }
    } else {
        println!("  Disabled");
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.dir);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would mirror page {} into {}",
        config.notion.root_id, config.output.dir
    );
}

/// Handles the --clear-cache mode
fn handle_clear_cache(config: &Config) -> anyhow::Result<()> {
    let removed = clear_cache(config)?;
    println!(
        "✓ Removed {} cached responses from {}",
        removed, config.cache.dir
    );
    Ok(())
}

/// Handles the main mirroring run
async fn handle_run(config: &Config, fresh: bool, quiet: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring cached responses)");
    } else {
        tracing::info!("Starting run (cached responses younger than {}s are reused)", config.cache.ttl_seconds);
    }

    match notion_wiki::run(config, fresh).await {
        Ok(summary) => {
            tracing::info!("Run completed successfully");
            if !quiet {
                print_summary(&summary);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
