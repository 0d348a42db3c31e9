// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::bus::{BusError, MessageBus, MessageStream};
use crate::process::{ProcessError, ProcessLauncher, SpawnedProcess};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::Instrument;

/// Wrapper that adds tracing to any MessageBus
#[derive(Clone)]
pub struct TracedBus<B> {
    inner: B,
}

impl<B> TracedBus<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: MessageBus> MessageBus for TracedBus<B> {
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let result = self.inner.request(subject, payload, timeout).await;
        match &result {
            Ok(reply) => tracing::debug!(subject, reply_len = reply.len(), "request answered"),
            // Expected while a worker warms up
            Err(BusError::NoResponders(_)) => tracing::trace!(subject, "no responders"),
            Err(e) => tracing::debug!(subject, error = %e, "request failed"),
        }
        result
    }

    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError> {
        let payload_len = payload.len();
        let result = self.inner.publish(subject, reply, payload).await;
        match &result {
            Ok(()) => tracing::debug!(subject, reply, payload_len, "published"),
            Err(e) => tracing::error!(subject, error = %e, "publish failed"),
        }
        result
    }

    async fn flush(&self) -> Result<(), BusError> {
        let result = self.inner.flush().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "flush failed");
        }
        result
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, BusError> {
        let span = tracing::info_span!("bus.subscribe", subject);
        async {
            let result = self.inner.subscribe(subject).await;
            match &result {
                Ok(_) => tracing::info!("subscribed"),
                Err(e) => tracing::error!(error = %e, "subscribe failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any ProcessLauncher
#[derive(Clone)]
pub struct TracedLauncher<L> {
    inner: L,
}

impl<L> TracedLauncher<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: ProcessLauncher> ProcessLauncher for TracedLauncher<L> {
    async fn launch(&self, command: &[String]) -> Result<SpawnedProcess, ProcessError> {
        let program = command.first().map(String::as_str).unwrap_or_default();
        let span = tracing::info_span!("process.launch", program);
        async {
            tracing::info!(args = ?command.get(1..).unwrap_or_default(), "starting");

            let start = std::time::Instant::now();
            let result = self.inner.launch(command).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(process) => tracing::info!(
                    pid = process.pid,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "process started"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "launch failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
