// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Denolet daemon (denoletd)
//!
//! Listens for jobs on the bus and keeps at most one worker alive while
//! they keep coming.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::lifecycle::{LifecycleError, Overrides};

#[derive(Parser)]
#[command(
    name = "denoletd",
    version,
    about = "Denolet - scale-to-zero worker dispatcher"
)]
struct Args {
    /// TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Bus server address (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Subject on which jobs arrive (overrides the config file)
    #[arg(long)]
    subject: Option<String>,

    /// Write logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Worker command; the bus endpoint and instance id are appended
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = lifecycle::resolve_config(
        args.config.as_deref(),
        Overrides {
            server: args.server,
            subject: args.subject,
            command: args.command,
        },
    )?;

    let _log_guard = setup_logging(args.log_file.as_deref())?;

    info!(
        server = %config.server,
        subject = %config.subject,
        command = ?config.worker.command,
        "starting denoletd"
    );

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("failed to start daemon: {}", e);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    };

    daemon.run(shutdown).await?;
    info!("daemon stopped");
    Ok(())
}

fn setup_logging(
    log_file: Option<&Path>,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            let name = path.file_name().ok_or(LifecycleError::LogPath)?;
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(dir)?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
