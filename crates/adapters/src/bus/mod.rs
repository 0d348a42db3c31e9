// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bus adapters

mod nats;

pub use nats::NatsBus;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BusCall, FakeBus};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// A message delivered to a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: Bytes,
    /// Where the sender expects the answer, if anywhere
    pub reply: Option<String>,
}

/// Messages arriving on a subscription; ends when the subscription closes
pub type MessageStream = BoxStream<'static, InboundMessage>;

/// Errors from bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no responders on {0}")]
    NoResponders(String),
    #[error("request to {0} timed out")]
    TimedOut(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("request to {subject} failed: {message}")]
    Request { subject: String, message: String },
    #[error("publish to {subject} failed: {message}")]
    Publish { subject: String, message: String },
    #[error("flush failed: {0}")]
    Flush(String),
    #[error("subscribe to {subject} failed: {message}")]
    Subscribe { subject: String, message: String },
}

/// Adapter for a subject-based publish/subscribe bus
#[async_trait]
pub trait MessageBus: Clone + Send + Sync + 'static {
    /// Send a request and wait up to `timeout` for the first reply
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError>;

    /// Fire-and-forget publish, optionally naming a reply subject
    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError>;

    /// Push buffered publishes to the server
    async fn flush(&self) -> Result<(), BusError>;

    /// Subscribe to a subject
    async fn subscribe(&self, subject: &str) -> Result<MessageStream, BusError>;
}
