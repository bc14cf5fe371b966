#![forbid(unsafe_code)]

//! `hostline`: guest messaging automation and delivery queue.
//!
//! `serve` runs the HTTP surface (webhooks, sweep triggers, queue API) with
//! the retention task and, optionally, the embedded sweep cadence.
//! `run-automations` and `run-queue` execute a single sweep and print its
//! JSON summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use hostline::automation::scheduler::{spawn_daily_task, AutomationScheduler};
use hostline::config::GlobalConfig;
use hostline::delivery::gateway::{Gateway, HttpGateway};
use hostline::delivery::pacer::{JitterPacer, Pacer};
use hostline::delivery::processor::{spawn_queue_task, QueueProcessor};
use hostline::persistence::db::{self, Database};
use hostline::persistence::retention;
use hostline::webhook::{server, AppState};
use hostline::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Run one automation sweep and print its summary.
    RunAutomations,
    /// Run one delivery sweep and print its summary.
    RunQueue,
}

#[derive(Debug, Parser)]
#[command(name = "hostline", about = "Guest messaging automation and delivery queue", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("hostline bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.database_path).await?);
    info!("database connected");

    let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(Duration::from_secs(
        config.queue.send_timeout_seconds,
    )));
    let pacer: Arc<dyn Pacer> = Arc::new(JitterPacer::new(
        config.queue.min_delay_ms,
        config.queue.max_delay_ms,
    ));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, gateway, pacer).await,
        Command::RunAutomations => {
            let scheduler = AutomationScheduler::new(db, &config);
            print_summary(&scheduler.run_sweep(Utc::now()).await?)
        }
        Command::RunQueue => {
            let processor = QueueProcessor::new(db, gateway, pacer, config.queue.clone());
            print_summary(&processor.run_sweep(Utc::now()).await?)
        }
    }
}

async fn serve(
    config: Arc<GlobalConfig>,
    db: Arc<Database>,
    gateway: Arc<dyn Gateway>,
    pacer: Arc<dyn Pacer>,
) -> Result<()> {
    let ct = CancellationToken::new();
    let state = Arc::new(AppState::new(Arc::clone(&config), &db, gateway, pacer));

    // ── Background tasks ────────────────────────────────
    let mut handles =
        vec![retention::spawn_retention_task(Arc::clone(&db), config.retention_days, ct.clone())];
    info!("retention service started");

    if config.schedule.enabled {
        handles.push(spawn_queue_task(
            Arc::clone(&state.processor),
            Duration::from_secs(config.schedule.queue_interval_seconds),
            ct.clone(),
        ));
        handles.push(spawn_daily_task(
            Arc::clone(&state.scheduler),
            Duration::from_secs(config.schedule.daily_interval_hours.saturating_mul(3600)),
            ct.clone(),
        ));
        info!("embedded sweep schedule started");
    }

    // ── HTTP server ─────────────────────────────────────
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!("hostline ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = http_handle.await;
    for handle in handles {
        let _ = handle.await;
    }
    info!("hostline shut down");

    Ok(())
}

fn print_summary<T: Serialize>(summary: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| AppError::Io(format!("failed to encode summary: {err}")))?;
    println!("{json}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
