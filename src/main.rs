//! Sumi-Trawl main entry point
//!
//! This is the command-line interface for the search crawler and the
//! timeline harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use sumi_trawl::config::{load_config_with_hash, Config};
use sumi_trawl::crawler::Coordinator;
use sumi_trawl::events::{ChannelProgressSink, ProgressEvent};
use sumi_trawl::output::print_crawl_summary;
use sumi_trawl::timeline::TimelineRunner;
use sumi_trawl::RunContext;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Sumi-Trawl: search-driven crawling and timeline harvesting
///
/// The crawl command pages through search results for a query and crawls
/// each result to a fixed link depth, writing one CSV row per page. The
/// timeline command pages through a search timeline and records posts or
/// downloads their media.
#[derive(Parser, Debug)]
#[command(name = "sumi-trawl")]
#[command(version)]
#[command(about = "Search-driven crawler and timeline harvester", long_about = None)]
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

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search and crawl the results to the configured depth
    Crawl {
        /// Resume an interrupted crawl from its saved state
        #[arg(long, conflicts_with = "fresh")]
        resume: bool,

        /// Start a fresh crawl, discarding previous state (default)
        #[arg(long, conflicts_with = "resume")]
        fresh: bool,
    },

    /// Harvest posts or media from the search timeline
    Timeline,

    /// Validate config and show what would run without touching the network
    DryRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::DryRun => handle_dry_run(&config),
        Command::Crawl { resume, fresh } => {
            if fresh {
                tracing::info!("Starting fresh crawl (ignoring previous state)");
            }
            handle_crawl(&config, &config_hash, resume && !fresh).await
        }
        Command::Timeline => handle_timeline(&config).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_trawl=info,warn"),
            1 => EnvFilter::new("sumi_trawl=debug,info"),
            2 => EnvFilter::new("sumi_trawl=trace,debug"),
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

/// Cancels `ctx` on Ctrl-C
fn install_interrupt_handler(ctx: RunContext) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctx.cancel();
        }
    });
}

/// Logs progress events until every sender is gone
fn spawn_progress_logger(mut rx: mpsc::Receiver<ProgressEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!("[{}] {}", event.count, event.message);
        }
    })
}

/// Handles the dry-run command: validates config and shows what would run
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Trawl Dry Run ===\n");

    println!("HTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!(
        "  Timeouts: {}s total, {}s connect",
        config.http.timeout_secs, config.http.connect_timeout_secs
    );

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);

    match &config.search {
        Some(search) => {
            println!("\nSearch:");
            println!("  Query: {}", search.query);
            println!("  Locales: {}", search.locales.join(", "));
            println!("  Max results: {}", search.max_results);
            println!("  Pages per locale: {}", search.max_pages);
            if let (Some(since), Some(until)) = (&search.since, &search.until) {
                println!("  Date range: {} to {}", since, until);
            }

            println!("\nCrawler:");
            println!("  Max depth: {}", config.crawler.max_depth);
            println!("  Max workers: {}", config.crawler.max_workers);
            println!("  Text limit: {} chars", config.crawler.text_limit);
        }
        None => println!("\nSearch: not configured"),
    }

    match &config.timeline {
        Some(timeline) => {
            println!("\nTimeline:");
            println!("  Tag: {}", timeline.tag);
            println!("  Filter: {}", timeline.filter);
            println!("  Mode: {}", timeline.mode.as_str());
            println!("  Target count: {}", timeline.target_count);
            println!(
                "  Concurrent downloads: {}",
                timeline.max_concurrent_downloads
            );
        }
        None => println!("\nTimeline: not configured"),
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, config_hash: &str, resume: bool) -> anyhow::Result<()> {
    let ctx = if resume {
        tracing::info!("Starting crawl (will resume if an interrupted run exists)");
        RunContext::resuming()
    } else {
        RunContext::new()
    };
    install_interrupt_handler(ctx.clone());

    let (progress, rx) = ChannelProgressSink::channel(256);
    let logger = spawn_progress_logger(rx);

    let coordinator = Coordinator::from_config(config, Arc::new(progress), ctx)?
        .with_config_hash(config_hash);
    let outcome = coordinator.run().await;
    drop(coordinator);
    let _ = logger.await;

    let outcome = outcome.context("crawl failed")?;
    println!();
    print_crawl_summary(&outcome.summary);
    println!("Records: {}", outcome.output_path.display());
    println!("Run state: {}", outcome.state_path.display());

    Ok(())
}

/// Handles the timeline command
async fn handle_timeline(config: &Config) -> anyhow::Result<()> {
    let ctx = RunContext::new();
    install_interrupt_handler(ctx.clone());

    let (progress, rx) = ChannelProgressSink::channel(256);
    let logger = spawn_progress_logger(rx);

    let runner = TimelineRunner::from_config(config, Arc::new(progress), ctx)?;
    let outcome = runner.run().await;
    drop(runner);
    let _ = logger.await;

    let outcome = outcome.context("timeline harvest failed")?;
    println!("\n=== Timeline Summary ===\n");
    println!("  Folder: {}", outcome.folder.display());
    println!("  Records: {}", outcome.output_path.display());
    println!("  Pages requested: {}", outcome.pages_requested);
    println!("  Items found: {}", outcome.items_discovered);
    println!("  Records written: {}", outcome.records_written);
    if outcome.items_skipped > 0 {
        println!("  Skipped after cancel: {}", outcome.items_skipped);
    }

    Ok(())
}
