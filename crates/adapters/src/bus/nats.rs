// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS bus adapter

use super::{BusError, InboundMessage, MessageBus, MessageStream};
use async_nats::client::{Request, RequestErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;

/// Bus adapter backed by a NATS connection
#[derive(Clone, Debug)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to `url`, announcing `name` to the server
    pub async fn connect(url: &str, name: &str) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(name)
            .connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let request = Request::new().payload(payload).timeout(Some(timeout));
        match self.client.send_request(subject.to_string(), request).await {
            Ok(message) => Ok(message.payload),
            Err(e) => Err(match e.kind() {
                RequestErrorKind::NoResponders => BusError::NoResponders(subject.to_string()),
                RequestErrorKind::TimedOut => BusError::TimedOut(subject.to_string()),
                _ => BusError::Request {
                    subject: subject.to_string(),
                    message: e.to_string(),
                },
            }),
        }
    }

    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError> {
        let result = match reply {
            Some(reply) => {
                self.client
                    .publish_with_reply(subject.to_string(), reply.to_string(), payload)
                    .await
            }
            None => self.client.publish(subject.to_string(), payload).await,
        };
        result.map_err(|e| BusError::Publish {
            subject: subject.to_string(),
            message: e.to_string(),
        })
    }

    async fn flush(&self) -> Result<(), BusError> {
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Flush(e.to_string()))
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                message: e.to_string(),
            })?;

        Ok(subscriber
            .map(|message| InboundMessage {
                subject: message.subject.to_string(),
                payload: message.payload,
                reply: message.reply.map(|r| r.to_string()),
            })
            .boxed())
    }
}
