// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle eviction: stop the worker once no job has arrived for a while

use crate::controller::WorkerController;
use denolet_adapters::{MessageBus, ProcessLauncher};
use denolet_core::{Clock, IdGen, InstanceId};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Outcome of one idle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleCheck {
    /// Recent activity; keep going
    Active,
    /// Idle too long; the worker was stopped
    Evicted,
    /// The instance this monitor was armed for is gone
    StoodDown,
}

/// Periodic idle check bound to one worker instance.
///
/// Never starts anything. Once its instance is gone (evicted, crashed or
/// replaced) it stands down; the router arms a fresh monitor per spawn.
pub struct IdleMonitor<B, L, C: Clock, I> {
    controller: WorkerController<B, L, C, I>,
    instance: InstanceId,
    threshold: Duration,
    interval: Duration,
}

impl<B, L, C, I> IdleMonitor<B, L, C, I>
where
    B: MessageBus,
    L: ProcessLauncher,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        controller: WorkerController<B, L, C, I>,
        instance: InstanceId,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            instance,
            threshold,
            interval,
        }
    }

    /// Run one check against the controller's activity clock
    pub async fn check(&self) -> IdleCheck {
        let snapshot = self.controller.snapshot();
        if snapshot.instance.as_ref() != Some(&self.instance) || !snapshot.state.has_instance() {
            return IdleCheck::StoodDown;
        }

        let idle = self.controller.idle_for();
        if idle <= self.threshold {
            return IdleCheck::Active;
        }

        tracing::info!(
            instance = %self.instance,
            idle_ms = idle.as_millis() as u64,
            "worker idle, stopping"
        );
        if self.controller.stop_instance(&self.instance).await {
            IdleCheck::Evicted
        } else {
            IdleCheck::StoodDown
        }
    }

    /// Tick every `interval` until the monitor stands down
    pub async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.check().await {
                IdleCheck::Active => continue,
                IdleCheck::Evicted | IdleCheck::StoodDown => break,
            }
        }
        tracing::debug!(instance = %self.instance, "idle monitor stood down");
    }

    /// Start the monitor as a background task
    pub fn arm(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[path = "idle_tests.rs"]
mod tests;
