//! Main entry point for the Quiz Duel session service
//!
//! This is the production entry point that initializes and runs the
//! complete match session service with proper error handling, logging,
//! and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use quiz_duel::config::AppConfig;
use quiz_duel::service::{AppState, HealthStatus};
use std::path::PathBuf;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Quiz Duel Session Service - real-time trivia matches with ELO settlement
#[derive(Parser)]
#[command(
    name = "quiz-duel",
    version,
    about = "Real-time head-to-head trivia match service",
    long_about = "Quiz Duel is a Rust-based session service that pairs players by rating \
                 over a WebSocket gateway, distributes randomized question batches, \
                 collects self-reported results, and settles ELO rating changes in a \
                 single durable transaction."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Bind address override
    #[arg(long, value_name = "ADDR", help = "Override the bind address")]
    bind_address: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override the HTTP/WebSocket port")]
    http_port: Option<u16>,

    /// Pairing window override
    #[arg(
        long,
        value_name = "RATING",
        help = "Override the pairing rating window (± points)"
    )]
    pairing_window: Option<i32>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting service")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config).await?;

    match app_state.session_stats() {
        Ok(stats) => {
            println!("Health Check: {}", HealthStatus::Healthy);
            println!("  Active Rooms: {}", stats.active_rooms);
            println!("  Waiting Rooms: {}", stats.waiting_rooms);
            println!("  Pairing Requests: {}", stats.pairing_requests);
            println!("  Matches Settled: {}", stats.matches_settled);
            std::process::exit(0);
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
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
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Periodically log a service status summary
async fn status_report_task(app_state: std::sync::Arc<tokio::sync::RwLock<AppState>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        let state = app_state.read().await;
        if !state.is_running().await {
            break;
        }
        match state.session_stats() {
            Ok(stats) => {
                info!(
                    "Status: {} active rooms, {} waiting, {} matches settled",
                    stats.active_rooms, stats.waiting_rooms, stats.matches_settled
                );
            }
            Err(e) => {
                warn!("Status report failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Quiz Duel Session Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Listening on: {}:{}",
        config.service.bind_address, config.service.http_port
    );
    info!("   Pairing window: ±{}", config.session.pairing_window);
    info!(
        "   Questions per match: {}",
        config.session.questions_per_match
    );
    info!(
        "   Room timeouts: waiting {}s, stalled {}s",
        config.session.waiting_timeout_seconds, config.session.stalled_timeout_seconds
    );
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    // Start with file- or environment-based config
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(bind_address) = &args.bind_address {
        config.service.bind_address = bind_address.clone();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(pairing_window) = args.pairing_window {
        config.session.pairing_window = pairing_window;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Handle special modes
    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    // Display startup information
    display_startup_banner(&config);

    // Initialize application state
    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    // Start the service
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    // Wrap for sharing with the status reporter
    let app_state = std::sync::Arc::new(tokio::sync::RwLock::new(app_state));

    let status_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            status_report_task(app_state).await;
        })
    };

    info!("Quiz Duel session service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    // Wait for shutdown signal
    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    status_task.abort();

    let shutdown_timeout = config.shutdown_timeout();
    let shutdown_future = async {
        app_state.write().await.shutdown().await;
        // Give background tasks a moment to observe the stop flag.
        sleep(Duration::from_millis(100)).await;
    };

    match tokio::time::timeout(shutdown_timeout, shutdown_future).await {
        Ok(()) => {
            info!("Graceful shutdown completed successfully");
        }
        Err(_) => {
            warn!("Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("Quiz Duel session service stopped");
    Ok(())
}
