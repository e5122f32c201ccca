// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed mutex daemon (dimutexd)
//!
//! Joins the cluster, then keeps requesting the critical section at a fixed
//! interval while answering peers' requests.

use std::path::{Path, PathBuf};

use clap::Parser;
use dimutex_daemon::lifecycle::{self, LifecycleError};
use dimutex_daemon::Config;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "dimutexd", version, about = "Distributed mutual exclusion node")]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    if args.check_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let log_path = config.log_path()?;

    // Write startup marker to log (before tracing setup, so it is never interleaved)
    write_startup_marker(&log_path)?;

    let log_guard = setup_logging(&log_path)?;

    let identity = config.identity();
    info!(node = %identity, log = %log_path.display(), "Starting dimutexd");

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&log_path, &e);
            error!("Failed to start node: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        rpc = %daemon.node.rpc_addr(),
        gossip = %daemon.membership.local_addr(),
        "Node ready"
    );
    println!("READY");

    let runner = lifecycle::runner(&config);
    {
        let work = daemon.node.run(&runner);
        tokio::pin!(work);

        let received = tokio::select! {
            () = &mut work => None,
            _ = sigterm.recv() => Some("SIGTERM"),
            _ = sigint.recv() => Some("SIGINT"),
        };
        match received {
            Some(name) => {
                info!("Received {}, shutting down...", name);
                // Abandons any pending claim, answering the peers it deferred
                daemon.node.stop();
                work.await;
            }
            None => warn!("request loop ended on its own"),
        }
    }

    daemon.shutdown().await;
    info!("dimutexd stopped");
    drop(log_guard);
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- dimutexd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- dimutexd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(log_path: &Path) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(log_path: &Path, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start node: {}", error);
}

/// Log to stdout and, through a non-blocking writer, to the log file
fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}
