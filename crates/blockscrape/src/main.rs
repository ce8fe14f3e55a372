//! # Blockscrape: Incremental Block Crawler
//!
//! Walks the chain height space in bounded-concurrency windows against
//! a blockchain.info-style API, accumulating every returned block
//! record in a single JSON store, and can verify that store on demand:
//!
//! - `blockscrape`: crawl indefinitely (Ctrl-C stops after the
//!   current window; a second Ctrl-C force-exits).
//! - `blockscrape check`: sort the store, verify height ordering, and
//!   log summary statistics.

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

mod adapters;
use adapters::{BlockchainInfoSource, JsonFileStore};

use blockscrape_sync::{check_store, BlockCrawler, CrawlerConfig, CrawlerHandle, DedupPolicy};

#[derive(clap::ValueEnum, Clone, Debug)]
enum Command {
    /// Verify that the store is height-ordered and report statistics
    Check,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional subcommand; with none the crawler runs indefinitely
    #[arg(value_enum)]
    command: Option<Command>,
    #[arg(long, default_value = "https://blockchain.info")]
    api_url: String,
    #[arg(
        long,
        help = "Path to the JSON store (default: all_blocks.json next to the working directory)"
    )]
    store_path: Option<PathBuf>,
    #[arg(long, default_value_t = 8, help = "Window size and fetch concurrency")]
    workers: usize,
    #[arg(long, help = "Stop once the window start reaches this height")]
    exit_at: Option<u64>,
    #[arg(long, default_value_t = 30, help = "Per-request timeout in seconds")]
    request_timeout: u64,
    #[arg(
        long,
        help = "Append re-fetched records verbatim instead of deduplicating on resume"
    )]
    keep_duplicates: bool,
}

/// The store defaults to a sibling of the working directory, matching
/// where downstream tooling expects `all_blocks.json`.
fn default_store_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let base = cwd.parent().map(|p| p.to_path_buf()).unwrap_or(cwd);
    Ok(base.join("all_blocks.json"))
}

/// Handle Ctrl-C: first signal stops the crawler at the next window
/// boundary, a second one force-exits.
async fn setup_signal_handler(handle: CrawlerHandle) {
    tokio::spawn(async move {
        let mut shutdown_requested = false;
        loop {
            match signal::ctrl_c().await {
                Ok(()) => {
                    if shutdown_requested {
                        eprintln!("force exiting");
                        std::process::exit(130);
                    }
                    shutdown_requested = true;
                    warn!(
                        "shutdown signal received, stopping after the current window \
                         (Ctrl-C again to force exit)"
                    );
                    handle.stop();
                }
                Err(err) => {
                    eprintln!("error setting up signal handler: {}", err);
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder().format_timestamp_secs().init();

    let args = Args::parse();
    let store_path = match args.store_path.clone() {
        Some(path) => path,
        None => default_store_path()?,
    };
    let store = JsonFileStore::new(store_path.clone());

    match args.command {
        Some(Command::Check) => {
            info!("checking store at {}", store_path.display());
            let mut store = store;
            let report = check_store(&mut store).await?;
            info!(
                "check complete: {} blocks, {} with more than 1 transaction",
                report.total_blocks, report.multi_tx_blocks
            );
        }
        None => {
            let source = BlockchainInfoSource::new(
                args.api_url.clone(),
                Duration::from_secs(args.request_timeout),
            )?;
            let config = CrawlerConfig {
                workers: args.workers,
                exit_at: args.exit_at,
                dedup: if args.keep_duplicates {
                    DedupPolicy::AllowDuplicates
                } else {
                    DedupPolicy::DropKnown
                },
            };

            info!(
                "starting crawl against {} with {} workers (store: {})",
                args.api_url,
                args.workers,
                store_path.display()
            );
            let mut crawler = BlockCrawler::new(source, store, config);
            setup_signal_handler(crawler.handle()).await;
            crawler.run().await?;
            info!("crawler stopped");
        }
    }

    Ok(())
}
