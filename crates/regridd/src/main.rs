//! regridd — the Regrid daemon.
//!
//! Single binary that assembles the rebalance control loop:
//! - Node and workload-set watchers (fed by the report API)
//! - Deduplicating rate-limited event queue
//! - Trigger policy + ready-node provider
//! - Engine worker loop
//! - REST API (ingestion + status)
//!
//! # Usage
//!
//! ```text
//! regridd run --config regrid.toml --port 8090
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use regrid_api::ApiState;
use regrid_core::{Engine, EngineConfig, PassCallback};
use regrid_state::LabelSelector;
use regrid_trigger::{CachedReadyNodes, ReadinessTrigger};
use regrid_watch::{CacheWatcher, PassTimer};

use crate::config::RegridConfig;

#[derive(Parser)]
#[command(name = "regridd", about = "Regrid rebalance daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the rebalance control loop and its API.
    Run {
        /// Path to the regrid.toml config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// API port; overrides the config file.
        #[arg(long)]
        port: Option<u16>,

        /// Log planned passes without handing them to the action stage.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,regridd=debug,regrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            dry_run,
        } => run_daemon(config, port, dry_run).await,
    }
}

async fn run_daemon(
    config_path: Option<PathBuf>,
    port_override: Option<u16>,
    dry_run: bool,
) -> anyhow::Result<()> {
    info!("regrid daemon starting");

    let config = match &config_path {
        Some(path) => {
            let config = RegridConfig::from_file(path)?;
            info!(?path, "config file loaded");
            config
        }
        None => RegridConfig::default(),
    };

    let selector = LabelSelector::parse(config.node_selector())
        .map_err(|e| anyhow::anyhow!("invalid node_selector: {e}"))?;

    // ── Watchers and their report feeds ────────────────────────
    let (nodes, node_feed) = CacheWatcher::new("nodes");
    let (workload_sets, set_feed) = CacheWatcher::new("workload-sets");

    // ── Engine ─────────────────────────────────────────────────
    let trigger = ReadinessTrigger::new().with_min_ready(config.min_ready());
    let on_pass: PassCallback = Arc::new(move |ready| {
        Box::pin(async move {
            // Boundary to the eviction/rescheduling stage.
            if dry_run {
                info!(?ready, "dry run: pass planned, taking no action");
            } else {
                info!(?ready, "pass target set selected");
            }
        })
    });

    let mut engine = Engine::new(
        nodes,
        workload_sets,
        Arc::new(trigger),
        Arc::new(CachedReadyNodes),
    )
    .with_pass_callback(on_pass)
    .with_config(EngineConfig {
        sync_timeout: config.sync_timeout(),
        max_retries: config.max_retries(),
    });

    if let Some(interval) = config.periodic_interval() {
        engine = engine.with_timer(PassTimer::new(interval)?)?;
        info!(interval_secs = interval.as_secs(), "periodic triggering enabled");
    }

    // ── API ────────────────────────────────────────────────────
    let api_state = ApiState {
        engine: engine.handle(),
        node_feed: node_feed.clone(),
        workload_set_feed: set_feed.clone(),
        node_selector: selector,
    };
    let router = regrid_api::build_router(api_state);

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start the engine ───────────────────────────────────────
    let mut engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    // The push source has no upstream inventory: complete each
    // watcher's initial list empty, caches fill from reports.
    node_feed.listed(vec![]);
    set_feed.listed(vec![]);

    // ── Serve the API ──────────────────────────────────────────
    let addr = SocketAddr::from(([0, 0, 0, 0], port_override.unwrap_or(config.port())));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    tokio::select! {
        res = server => res?,
        res = &mut engine_task => {
            // Engine ended before a shutdown was requested: fatal
            // startup error or an early clean stop. Log and return;
            // the exit code is the caller's business.
            res??;
            info!("engine stopped before shutdown was requested");
            return Ok(());
        }
    }

    engine_task.await??;
    info!("regrid daemon stopped");
    Ok(())
}
