//! Streak Oracle Service
//!
//! Polls the configured game-result sources, keeps each game's round history
//! on disk and serves predictions over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streak_oracle::config::OracleConfig;
use streak_oracle::{poller, server, Oracle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Streak Oracle Service
#[derive(Parser, Debug)]
#[command(name = "streak-server")]
#[command(about = "Poll game results and serve pattern-table predictions")]
struct Args {
    /// Path to the YAML config (default: $ORACLE_CONFIG_PATH or config/oracle.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve stored state without polling upstreams
    #[arg(long)]
    no_poll: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| {
        PathBuf::from(
            std::env::var("ORACLE_CONFIG_PATH").unwrap_or_else(|_| "config/oracle.yaml".to_string()),
        )
    });
    let config_exists = config_path.exists();
    let config = OracleConfig::load_or_default(&config_path)
        .context("Failed to load configuration")?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_filter))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if config_exists {
        info!("Loaded config from: {}", config_path.display());
    } else {
        warn!("Config file not found, using defaults: {}", config_path.display());
    }

    info!("Configuration:");
    info!("  Games: {}", config.games.iter().map(|g| g.id.as_str()).collect::<Vec<_>>().join(", "));
    info!("  Polling interval: {}ms", config.polling.interval_ms);
    info!("  State dir: {}", config.storage.state_dir.display());
    match config.storage.retention {
        Some(cap) => info!("  Retention: last {} rounds", cap),
        None => info!("  Retention: unbounded"),
    }
    info!(
        "  Matching: {:?}, confidence {:?}",
        config.prediction.match_mode, config.prediction.confidence
    );

    let oracle = Arc::new(Oracle::from_config(&config).context("Failed to open oracle state")?);
    let running = Arc::new(AtomicBool::new(true));

    let pollers = if args.no_poll {
        info!("Polling disabled");
        Vec::new()
    } else {
        poller::spawn_all(&config, Arc::clone(&oracle), Arc::clone(&running))?
    };

    let shutdown_flag = Arc::clone(&running);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
        shutdown_flag.store(false, Ordering::SeqCst);
    };

    let result = server::run(Arc::clone(&oracle), &config.server.host, config.server.port, shutdown).await;

    running.store(false, Ordering::SeqCst);
    for handle in pollers {
        handle.abort();
    }
    info!("Stopped");
    result
}
