use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratewarden::config::ServiceConfig;
use ratewarden::http::HttpServer;
use ratewarden::ratelimit::{RateLimiter, SystemClock, TokenLimitList};
use ratewarden::storage::RedisStore;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "ratewarden", version, about = "IP and token based HTTP rate limiter")]
struct Args {
    /// Optional YAML configuration file, overridden by RATELIMIT_* variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Ratewarden Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(args.config.as_deref())?;
    let listen_addr = config.listen_addr()?;
    info!(
        http_addr = %listen_addr,
        default_limit = config.default_limit,
        cleanup_interval_ms = config.cleanup_interval,
        block_time_ms = config.block_time,
        "Configuration loaded"
    );

    let tokens = TokenLimitList::parse(&config.token_list);
    info!(tokens = tokens.len(), "Token limits loaded");

    let store = RedisStore::connect(config.redis_connection_info()?)
        .await
        .map_err(|e| anyhow::anyhow!("redis client error: {}", e))?;

    let rate_limiter = Arc::new(RateLimiter::new(
        config.limiter_settings(),
        Arc::new(tokens),
        Arc::new(store),
        Arc::new(SystemClock),
    ));
    info!("Rate limiter initialized");

    let server = HttpServer::bind(listen_addr, rate_limiter.clone()).await?;

    // Run the server with graceful shutdown on Ctrl+C
    let served = server
        .serve_with_shutdown(shutdown_signal(rate_limiter.has_sweeper()))
        .await;

    rate_limiter.shutdown().await;
    info!(sweeper_running = rate_limiter.has_sweeper(), "Rate limiter shut down");
    served?;

    info!("Ratewarden Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
///
/// `sweeper_running` is only reported; the sweeper is stopped by the caller
/// once the server has drained.
async fn shutdown_signal(sweeper_running: bool) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(sweeper_running, "Received Ctrl+C, draining HTTP connections");
        }
        _ = terminate => {
            info!(sweeper_running, "Received SIGTERM, draining HTTP connections");
        }
    }
}
