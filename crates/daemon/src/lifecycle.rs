// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: config resolution, startup, shutdown.

use std::future::Future;
use std::path::Path;

use denolet_adapters::{
    BusError, LocalLauncher, MessageBus, NatsBus, ProcessLauncher, TracedBus, TracedLauncher,
};
use denolet_core::{Clock, ConfigError, DispatcherConfig, IdGen, SystemClock, UuidIdGen};
use denolet_engine::{
    ControllerConfig, ControllerDeps, RequestRouter, RouterConfig, WorkerController,
};
use thiserror::Error;
use tracing::info;

/// Daemon with concrete adapter types (wrapped with tracing)
pub type DaemonState =
    Daemon<TracedBus<NatsBus>, TracedLauncher<LocalLauncher>, SystemClock, UuidIdGen>;

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub subject: Option<String>,
    /// Worker command; empty keeps the configured one
    pub command: Vec<String>,
}

/// Load the config file (or defaults), apply overrides, validate
pub fn resolve_config(
    path: Option<&Path>,
    overrides: Overrides,
) -> Result<DispatcherConfig, LifecycleError> {
    let mut config = match path {
        Some(path) => DispatcherConfig::load(path)?,
        None => DispatcherConfig::default(),
    };

    if let Some(server) = overrides.server {
        config.server = server;
    }
    if let Some(subject) = overrides.subject {
        config.subject = subject;
    }
    if !overrides.command.is_empty() {
        config.worker.command = overrides.command;
    }

    config.validate()?;
    Ok(config)
}

/// A wired router plus the controller it drives
pub struct Daemon<B, L, C: Clock, I> {
    pub router: RequestRouter<B, L, C, I>,
}

impl<B, L, C, I> Daemon<B, L, C, I>
where
    B: MessageBus,
    L: ProcessLauncher,
    C: Clock,
    I: IdGen,
{
    /// Wire the controller and router over the given adapters
    pub fn assemble(
        bus: B,
        launcher: L,
        clock: C,
        id_gen: I,
        config: &DispatcherConfig,
    ) -> Self {
        let controller = WorkerController::new(
            ControllerDeps {
                bus: bus.clone(),
                launcher,
            },
            ControllerConfig::from(config),
            clock,
            id_gen,
        );
        let router = RequestRouter::new(bus, controller, RouterConfig::from(config));
        Self { router }
    }

    /// Serve jobs until `shutdown` resolves, then stop any running worker
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), LifecycleError> {
        let served = self.router.run(shutdown).await;
        self.shutdown().await;
        served.map_err(LifecycleError::Subscribe)
    }

    /// Stop the worker so it receives its shutdown notice
    pub async fn shutdown(&self) {
        info!("shutting down");
        if self.router.controller().stop().await {
            info!("worker stopped for shutdown");
        }
        info!("shutdown complete");
    }
}

/// Connect to the bus and wire the production adapters
pub async fn startup(config: &DispatcherConfig) -> Result<DaemonState, LifecycleError> {
    let url = config.connect_url();
    let bus = NatsBus::connect(&url, &config.client_name)
        .await
        .map_err(|source| LifecycleError::Connect {
            server: url.clone(),
            source,
        })?;
    info!(server = %url, client = %config.client_name, "connected to bus");

    Ok(Daemon::assemble(
        TracedBus::new(bus),
        TracedLauncher::new(LocalLauncher::new()),
        SystemClock,
        UuidIdGen,
        config,
    ))
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: BusError,
    },

    #[error("job subscription failed: {0}")]
    Subscribe(#[source] BusError),

    #[error("log file has no parent directory or name")]
    LogPath,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
