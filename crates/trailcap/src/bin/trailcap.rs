//! trailcap daemon binary
//!
//! Records sensor captures on a field unit:
//! - keypad `1` (or `1` + Enter on stdin) starts a capture
//! - keypad `4` ends and saves it
//! - Ctrl-C stops the daemon; a capture in progress is not saved

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use trailcap::controller::{CaptureContext, SessionController};
use trailcap::hardware::{signal_for_key, BoardRegistry, Hardware};
use trailcap::signal::{signal_queue, SignalSender};
use trailcap::telemetry;
use trailconf::SystemConfig;

/// Field capture recorder
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file used in place of ./trailcap.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Board to run on (mock, udoo-neo); overrides system.board
    #[arg(short, long)]
    board: Option<String>,
}

fn build_context(config: SystemConfig) -> Result<CaptureContext> {
    let platform = BoardRegistry::with_defaults()
        .build_configured(&config)
        .context("Failed to build platform")?;
    let store = capstore::open(&config.store, config.system.id).context("Failed to open store")?;
    let hardware = Arc::new(Hardware::new(platform, &config));

    Ok(CaptureContext {
        config: Arc::new(config),
        hardware,
        store,
    })
}

fn forward_stdin_keys(sender: SignalSender) -> std::io::Result<()> {
    thread::Builder::new()
        .name("stdin-keys".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                for key in line.trim().chars() {
                    match signal_for_key(key) {
                        Some(signal) => {
                            if sender.enqueue(signal).is_err() {
                                return;
                            }
                        }
                        None => debug!("ignoring key {:?}", key),
                    }
                }
            }
            debug!("stdin closed");
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = SystemConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(board) = cli.board {
        config.system.board = board;
    }

    telemetry::init(&config.telemetry.log_level).context("Failed to initialize logging")?;

    info!("trailcap {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!("   config: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        info!("   env overrides: {}", sources.env_overrides.join(", "));
    }
    if config.system.id.is_nil() {
        warn!("system.id is not set; captures will be indexed under the nil system");
    }
    info!(
        "board {} at {} Hz with {} sensors",
        config.system.board,
        config.system.frequency,
        config.sensors.len()
    );

    // Blocking store clients must not be created on an async worker
    let context = tokio::task::spawn_blocking(move || build_context(config))
        .await
        .context("Setup task failed")??;

    let (sender, queue) = signal_queue();
    context.hardware.connect_keypad(sender.clone());
    forward_stdin_keys(sender.clone()).context("Failed to start stdin reader")?;

    let (done_tx, done_rx) = oneshot::channel();
    let controller = thread::Builder::new()
        .name("session-controller".to_string())
        .spawn(move || {
            SessionController::new(context, queue).run();
            let _ = done_tx.send(());
        })
        .context("Failed to start session controller")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            sender.interrupt();
        }
        _ = done_rx => {}
    }

    tokio::task::spawn_blocking(move || controller.join())
        .await
        .context("Join task failed")?
        .map_err(|_| anyhow::anyhow!("session controller panicked"))?;

    info!("trailcap shutdown complete");
    Ok(())
}
