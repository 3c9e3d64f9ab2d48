use std::path::Path;

use clap::Parser;
use derivo_engine::{CacheOutcome, CacheRun, MediaCache, parse_media_items};
use error::AppError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod config;
mod error;
mod utils;

use cli::CliArgs;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    init_logging(&args)?;

    info!(
        "Derivo {} - media derivative cache by hua0512",
        env!("CARGO_PKG_VERSION")
    );

    let listing = parse_media_items(&read_input(&args.input).await?)?;
    if !listing.rejected.is_empty() {
        warn!(
            rejected = listing.rejected.len(),
            "Some media items could not be read and are left out"
        );
    }
    let items = listing.items;
    info!(input = %args.input, items = items.len(), "Loaded media listing");

    let cache_config = config::cache_config(&args);
    info!(
        cache_root = ?cache_config.cache_root,
        public_prefix = %cache_config.public_prefix,
        item_concurrency = cache_config.item_concurrency,
        max_retries = cache_config.retry.max_retries,
        "Cache configuration"
    );
    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );

    let cache = MediaCache::new(cache_config)?;
    let run = cache.cache_items(&items).await?;
    report(&run);

    let json = serde_json::to_vec_pretty(&run.items)?;
    write_output(args.output.as_deref(), &json).await?;

    Ok(())
}

/// Logs go to stderr so stdout stays free for the JSON output.
fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let builder = FmtSubscriber::builder().with_max_level(log_level);

    let result = match &args.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;

            let multi_writer = MakeWriterExt::and(std::io::stderr, log_file);
            let subscriber = builder
                .with_writer(multi_writer)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };

    result.map_err(|e| AppError::Initialization(e.to_string()))
}

async fn read_input(input: &str) -> Result<String, AppError> {
    let listing = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input).await?
    };

    if listing.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("media listing '{input}' is empty")));
    }

    Ok(listing)
}

async fn write_output(output: Option<&Path>, json: &[u8]) -> Result<(), AppError> {
    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            info!(path = ?path, "Wrote enriched items");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(json).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn report(run: &CacheRun) {
    match &run.outcome {
        CacheOutcome::Hit => {
            info!(version = %run.version, items = run.items.len(), "Cache is up to date");
        }
        CacheOutcome::Rebuilt(stats) => {
            info!(
                version = %run.version,
                cached = stats.cached,
                dropped = stats.dropped,
                "Cache rebuilt"
            );
            if !stats.manifest.is_stored() || !stats.version.is_stored() {
                warn!("Cache metadata could not be fully persisted");
            }
        }
        CacheOutcome::Unavailable => {
            warn!(version = %run.version, "Cache manifest unreadable, no items were served");
        }
    }
}
