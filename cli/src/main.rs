//! leanindex CLI: run the header indexer or probe a Lean endpoint.
//!
//! Usage:
//! ```bash
//! # Index headers using ./config.yaml (or the built-in defaults)
//! leanindex run --config ./config.yaml
//!
//! # Fetch one header from an endpoint
//! leanindex probe --url http://127.0.0.1:5052 --id finalized
//! ```

mod config;
mod logging;

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use leanindex_core::{BlockId, IndexerConfig};
use leanindex_indexer::Indexer;
use leanindex_rpc::{HeaderSource, HttpHeaderSource};
use leanindex_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::logging::init_tracing;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "run" => cmd_run(&args[2..]).await,
        "probe" => cmd_probe(&args[2..]).await,
        "info" => {
            cmd_info();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("leanindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("leanindex {}", env!("CARGO_PKG_VERSION"));
    println!("Block header indexer for Lean consensus devnets\n");
    println!("USAGE:");
    println!("    leanindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    run      Run the indexer until SIGINT/SIGTERM");
    println!("    probe    Fetch one header from an endpoint");
    println!("    info     Show default configuration");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("RUN FLAGS:");
    println!("    --config <PATH>  YAML config file (built-in defaults if omitted)\n");
    println!("PROBE FLAGS:");
    println!("    --url <URL>      Endpoint base URL  [required]");
    println!("    --id <BLOCK_ID>  head | genesis | justified | finalized | <slot> | 0x<root>  [default: head]");
}

async fn cmd_run(args: &[String]) -> Result<()> {
    let path = parse_flag(args, "--config").map(PathBuf::from);
    let config = AppConfig::load(path.as_deref())?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoints = config.indexer.endpoints.len(),
        database = %config.database.file,
        "Starting LeanIndex"
    );

    let store = SqliteStorage::open(&config.database.file)
        .await
        .with_context(|| format!("opening database {}", config.database.file))?;
    let indexer = Indexer::new(config.indexer, Arc::new(store))?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Received interrupt signal, initiating graceful shutdown");
            shutdown.cancel();
        }
    });

    indexer.start(shutdown).await?;
    info!("LeanIndex terminated");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn cmd_probe(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").context("--url is required")?;
    let id: BlockId = parse_flag(args, "--id")
        .as_deref()
        .unwrap_or("head")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let source = HttpHeaderSource::new(url.clone(), Duration::from_secs(10))?;

    let start = Instant::now();
    let header = source.fetch_header(&id).await?;
    let latency = start.elapsed();

    let report = serde_json::json!({
        "endpoint": url,
        "block_id": id.to_string(),
        "latency_ms": latency.as_millis() as u64,
        "canonical_root": header.root_hex().ok(),
        "header": header,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("LeanIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default endpoint: http://127.0.0.1:5052");
    println!("  Default database: ./leanindex.db (SQLite, WAL)");
    println!("  Poll interval: {}ms", defaults.poll_interval_ms);
    println!(
        "  Head fetch: {} attempts, {}ms apart",
        defaults.max_retries, defaults.retry_delay_ms
    );
    println!("  Backfill batch size: {} slots", defaults.backfill_batch_size);
    println!("  Health check interval: {}ms", defaults.health_check_interval_ms);
    println!("  Recent block cache: {} headers", defaults.recent_blocks_capacity);
    println!("  Environment overrides: LEANAPI_ENDPOINT, DATABASE_FILE");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
