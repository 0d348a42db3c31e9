// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Public job subject -> controller operations

use crate::controller::WorkerController;
use crate::idle::IdleMonitor;
use denolet_adapters::{BusError, InboundMessage, MessageBus, ProcessLauncher};
use denolet_core::{Clock, DispatcherConfig, IdGen, InstanceId};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;

/// Router settings
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Public subject on which jobs arrive
    pub subject: String,
    pub idle_threshold: Duration,
    pub idle_check_interval: Duration,
}

impl From<&DispatcherConfig> for RouterConfig {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            subject: config.subject.clone(),
            idle_threshold: config.timing.idle_threshold,
            idle_check_interval: config.timing.idle_check_interval,
        }
    }
}

/// What happened to one inbound job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Relayed to this instance
    Forwarded(InstanceId),
    /// No worker could be started; the job is gone
    Dropped,
    /// Relay failed; the worker was reset and the job is gone
    Reset,
}

/// Subscribes to the public subject and drives the controller per job
pub struct RequestRouter<B, L, C: Clock, I> {
    bus: B,
    controller: WorkerController<B, L, C, I>,
    config: RouterConfig,
}

impl<B: Clone, L, C: Clock, I> Clone for RequestRouter<B, L, C, I> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            controller: self.controller.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B, L, C, I> RequestRouter<B, L, C, I>
where
    B: MessageBus,
    L: ProcessLauncher,
    C: Clock,
    I: IdGen,
{
    pub fn new(bus: B, controller: WorkerController<B, L, C, I>, config: RouterConfig) -> Self {
        Self {
            bus,
            controller,
            config,
        }
    }

    pub fn controller(&self) -> &WorkerController<B, L, C, I> {
        &self.controller
    }

    /// Serve jobs until `shutdown` resolves or the subscription closes.
    ///
    /// Every job is handled on its own task, so a slow start never holds up
    /// the subscription. Handlers still in flight at shutdown run to
    /// completion in the background.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), BusError> {
        let mut jobs = self.bus.subscribe(&self.config.subject).await?;
        tracing::info!(subject = %self.config.subject, "listening for jobs");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("router shutting down");
                    break;
                }
                next = jobs.next() => match next {
                    Some(message) => {
                        let router = self.clone();
                        tokio::spawn(async move {
                            router.handle(message).await;
                        });
                    }
                    None => {
                        tracing::warn!(subject = %self.config.subject, "job subscription closed");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    /// Process one inbound job: record activity, make sure a worker is up,
    /// relay the payload
    pub async fn handle(&self, message: InboundMessage) -> JobOutcome {
        self.controller.record_activity();
        tracing::debug!(
            payload_len = message.payload.len(),
            reply = message.reply.as_deref(),
            "received job"
        );

        let started = match self.controller.ensure_started().await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(error = %e, "failed to start worker, dropping job");
                return JobOutcome::Dropped;
            }
        };
        if started.spawned {
            self.supervise(&started.id);
        }

        match self
            .controller
            .forward(message.payload, message.reply.as_deref())
            .await
        {
            Ok(id) => JobOutcome::Forwarded(id),
            Err(e) => {
                tracing::error!(
                    instance = %started.id,
                    error = %e,
                    "failed to forward job, resetting worker"
                );
                // Scoped to the instance this job started with; a newer one
                // belongs to other jobs
                self.controller.stop_instance(&started.id).await;
                JobOutcome::Reset
            }
        }
    }

    /// Arm the idle monitor for a fresh instance and log when it is gone
    fn supervise(&self, id: &InstanceId) {
        IdleMonitor::new(
            self.controller.clone(),
            id.clone(),
            self.config.idle_threshold,
            self.config.idle_check_interval,
        )
        .arm();

        let controller = self.controller.clone();
        let id = id.clone();
        tokio::spawn(async move {
            controller.wait_instance(&id).await;
            tracing::info!(instance = %id, "worker gone, next job starts a fresh one");
        });
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
