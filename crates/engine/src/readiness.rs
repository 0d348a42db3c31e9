// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness polling for a freshly spawned worker

use bytes::Bytes;
use denolet_adapters::{BusError, MessageBus};
use denolet_core::InstanceId;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Why a worker was not confirmed ready
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("no reply on {subject} after {attempts} attempts over {waited:?}")]
    TimedOut {
        subject: String,
        attempts: u32,
        waited: Duration,
    },
}

/// Pings `ping.<id>` until the worker answers or the deadline passes
#[derive(Clone)]
pub struct ReadinessProbe<B> {
    bus: B,
    attempt_timeout: Duration,
    backoff: Duration,
}

impl<B: MessageBus> ReadinessProbe<B> {
    pub fn new(bus: B, attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            bus,
            attempt_timeout,
            backoff,
        }
    }

    /// Wait for the worker's first liveness reply.
    ///
    /// Returns the number of attempts it took. Never reports a timeout before
    /// `deadline` has fully elapsed; every failed attempt (no responders, a
    /// per-attempt timeout or a transport error) is retried after the backoff.
    pub async fn wait_until_ready(
        &self,
        id: &InstanceId,
        deadline: Duration,
    ) -> Result<u32, ReadinessError> {
        let subject = id.subjects().ping;
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            let waited = start.elapsed();
            if waited >= deadline {
                return Err(ReadinessError::TimedOut {
                    subject,
                    attempts,
                    waited,
                });
            }

            attempts += 1;
            let timeout = self.attempt_timeout.min(deadline - waited);
            match self.bus.request(&subject, Bytes::new(), timeout).await {
                Ok(_) => {
                    tracing::debug!(
                        instance = %id,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "worker answered ping"
                    );
                    return Ok(attempts);
                }
                Err(BusError::NoResponders(_)) => {
                    tracing::trace!(instance = %id, attempts, "worker not subscribed yet");
                }
                Err(e) => {
                    tracing::debug!(instance = %id, attempts, error = %e, "ping failed");
                }
            }

            let remaining = deadline.saturating_sub(start.elapsed());
            tokio::time::sleep(self.backoff.min(remaining)).await;
        }
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
