// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake bus adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BusError, InboundMessage, MessageBus, MessageStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Recorded bus call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Request {
        subject: String,
    },
    Publish {
        subject: String,
        reply: Option<String>,
        payload: Bytes,
    },
    Flush,
    Subscribe {
        subject: String,
    },
}

#[derive(Default)]
struct FakeBusState {
    calls: Vec<BusCall>,
    /// Subject prefix -> requests answered with "no responders" before replying
    responders: Vec<(String, u32)>,
    /// Remaining misses per concrete subject
    misses: HashMap<String, u32>,
    fail_publish: Vec<String>,
    subscribers: Vec<(String, mpsc::UnboundedSender<InboundMessage>)>,
}

/// In-memory bus that records every call
#[derive(Clone)]
pub struct FakeBus {
    state: Arc<Mutex<FakeBusState>>,
    tap: broadcast::Sender<InboundMessage>,
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBus {
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(FakeBusState::default())),
            tap,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeBusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<BusCall> {
        self.lock().calls.clone()
    }

    /// Publishes to exactly `subject`, as (reply, payload) pairs
    pub fn published_to(&self, subject: &str) -> Vec<(Option<String>, Bytes)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BusCall::Publish {
                    subject: s,
                    reply,
                    payload,
                } if s == subject => Some((reply.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// Publishes whose subject starts with `prefix`
    pub fn publish_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BusCall::Publish { subject, .. } if subject.starts_with(prefix)))
            .count()
    }

    /// Requests whose subject starts with `prefix`
    pub fn request_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BusCall::Request { subject } if subject.starts_with(prefix)))
            .count()
    }

    pub fn flush_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BusCall::Flush))
            .count()
    }

    /// Answer requests on subjects starting with `prefix`, after `misses`
    /// "no responders" outcomes per concrete subject
    pub fn respond_after(&self, prefix: &str, misses: u32) {
        self.lock().responders.push((prefix.to_string(), misses));
    }

    /// Make publishes to subjects starting with `prefix` fail
    pub fn fail_publishes_to(&self, prefix: &str) {
        self.lock().fail_publish.push(prefix.to_string());
    }

    /// Observe every successful publish
    pub fn tap(&self) -> broadcast::Receiver<InboundMessage> {
        self.tap.subscribe()
    }

    /// Deliver a message from an outside client to matching subscribers
    pub fn inject(&self, subject: &str, payload: impl Into<Bytes>, reply: Option<&str>) {
        let message = InboundMessage {
            subject: subject.to_string(),
            payload: payload.into(),
            reply: reply.map(String::from),
        };
        self.deliver(&message);
    }

    /// Close every open subscription stream
    pub fn close_subscriptions(&self) {
        self.lock().subscribers.clear();
    }

    fn deliver(&self, message: &InboundMessage) {
        let mut state = self.lock();
        state.subscribers.retain(|(subject, tx)| {
            if subject == &message.subject {
                tx.send(message.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    async fn request(
        &self,
        subject: &str,
        _payload: Bytes,
        _timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let mut state = self.lock();
        state.calls.push(BusCall::Request {
            subject: subject.to_string(),
        });

        let Some(misses) = state
            .responders
            .iter()
            .find(|(prefix, _)| subject.starts_with(prefix.as_str()))
            .map(|(_, misses)| *misses)
        else {
            return Err(BusError::NoResponders(subject.to_string()));
        };

        let remaining = state.misses.entry(subject.to_string()).or_insert(misses);
        if *remaining > 0 {
            *remaining -= 1;
            return Err(BusError::NoResponders(subject.to_string()));
        }
        Ok(Bytes::new())
    }

    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError> {
        let message = InboundMessage {
            subject: subject.to_string(),
            payload,
            reply: reply.map(String::from),
        };
        {
            let mut state = self.lock();
            if state
                .fail_publish
                .iter()
                .any(|prefix| subject.starts_with(prefix.as_str()))
            {
                return Err(BusError::Publish {
                    subject: subject.to_string(),
                    message: "injected failure".to_string(),
                });
            }
            state.calls.push(BusCall::Publish {
                subject: message.subject.clone(),
                reply: message.reply.clone(),
                payload: message.payload.clone(),
            });
        }

        // No receivers is fine
        let _ = self.tap.send(message.clone());
        self.deliver(&message);
        Ok(())
    }

    async fn flush(&self) -> Result<(), BusError> {
        self.lock().calls.push(BusCall::Flush);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, BusError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            state.calls.push(BusCall::Subscribe {
                subject: subject.to_string(),
            });
            state.subscribers.push((subject.to_string(), tx));
        }

        let stream = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(stream.boxed())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
