//! hub-gateway: Agent Hub Main Binary
//!
//! Main entry point for the Agent Hub application.
//!
//! Usage:
//!   hub-gateway           - Start server mode (HTTP API + orchestrator + fast service)
//!   hub-gateway --cli     - Start interactive CLI mode
//!   hub-gateway --help    - Show help

mod cli;
mod error;

use hub_api::AppState;
use hub_core::{
    Config, EventBus, FastTaskService, HandlerTable, HubEvent, Orchestrator, ResultCache,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Server mode (HTTP API)
    Server,
    /// Interactive CLI mode
    Cli,
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Services shared by both run modes
pub struct Hub {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub fast: Arc<FastTaskService>,
}

impl Hub {
    fn new(config: Config) -> Self {
        let events = Arc::new(EventBus::new());
        events.on_any(log_event);

        let orchestrator = Orchestrator::with_default_agents(
            HandlerTable::simulated(&config.simulation),
            events,
        );
        let fast = FastTaskService::new(
            HandlerTable::fast(),
            Arc::new(ResultCache::from_config(&config.cache)),
            config.queue.clone(),
        );

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            fast: Arc::new(fast),
        }
    }

    async fn shutdown(&self) {
        self.fast.stop().await;
        self.orchestrator.stop().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("hub-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting hub-gateway...");
    tracing::info!(
        "Queue: capacity={} concurrency={} timeout={}s, cache: capacity={} ttl={}s",
        config.queue.capacity,
        config.queue.max_concurrency,
        config.queue.task_timeout_secs,
        config.cache.capacity,
        config.cache.ttl_secs,
    );

    let hub = Hub::new(config);

    match mode {
        RunMode::Cli => {
            tracing::info!("Running in CLI mode");
            hub.fast.start().await;
            if hub.config.orchestrator.auto_start {
                hub.orchestrator.start().await;
            }
            let result = cli::run_cli(&hub).await;
            hub.shutdown().await;
            result
        }
        RunMode::Server => run_server(hub).await,
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--cli" | "-c" => return RunMode::Cli,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("hub-gateway - Agent Hub task orchestration gateway");
    println!();
    println!("Usage:");
    println!("  hub-gateway           Start server mode (HTTP API)");
    println!("  hub-gateway --cli     Start interactive CLI mode");
    println!("  hub-gateway --help    Show this help message");
    println!("  hub-gateway --version Show version");
    println!();
    println!("Configuration is read from ./hub.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  HUB_API_PORT          HTTP API port (default: 3000)");
    println!("  HUB_API_KEY           Bearer key for /api routes (optional)");
    println!("  HUB_AUTO_START        Start the orchestrator at boot (default: false)");
    println!("  HUB_CACHE_CAPACITY    Result cache capacity (default: 1000)");
    println!("  HUB_CACHE_TTL_SECS    Result cache TTL (default: 300)");
    println!("  HUB_QUEUE_CAPACITY    Fast service queue capacity (default: 256)");
    println!("  HUB_MAX_CONCURRENCY   Fast service concurrency (default: 10)");
    println!("  HUB_TASK_TIMEOUT_SECS Fast service task timeout (default: 30)");
    println!("  HUB_SIMULATION_MIN_MS Simulated handler delay lower bound (default: 1000)");
    println!("  HUB_SIMULATION_MAX_MS Simulated handler delay upper bound (default: 6000)");
    println!("  RUST_LOG              Log filter (default: info)");
}

/// Lifecycle events go to the log
fn log_event(event: &HubEvent) {
    match event.task() {
        Some(task) => tracing::info!(
            event = %event.kind(),
            task = %task.id,
            kind = %task.kind,
            status = %task.status,
            "Task event"
        ),
        None => tracing::info!(event = %event.kind(), "Hub event"),
    }
}

/// Run server mode (HTTP API)
async fn run_server(hub: Hub) -> anyhow::Result<()> {
    hub.fast.start().await;
    if hub.config.orchestrator.auto_start {
        hub.orchestrator.start().await;
    } else {
        tracing::info!("Orchestrator waits for an explicit start (auto_start = false)");
    }

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let state = AppState::new(
        hub.config.clone(),
        Arc::clone(&hub.orchestrator),
        Arc::clone(&hub.fast),
    );
    let api_port = hub.config.api.port;
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };
        if let Err(e) = hub_api::start_server(state, shutdown).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    tracing::info!("HTTP API server starting on port {}", api_port);

    tracing::info!("hub-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        tracing::warn!("HTTP API task ended abnormally: {}", e);
    }
    hub.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
