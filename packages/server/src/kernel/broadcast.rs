//! Broadcast channel abstraction for live delivery.
//!
//! The engine only ever publishes: a structured message goes to a per-player
//! subject (or the global subject) and is forgotten. Production publishes over
//! NATS; without a NATS server the messages are only logged; tests record them.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::RwLock;

use crate::common::PlayerId;

pub const GLOBAL_SUBJECT: &str = "farm.global";

/// Subject carrying messages meant for a single player.
pub fn player_subject(id: PlayerId) -> String {
    format!("farm.player.{}", id)
}

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

#[async_trait]
pub trait BroadcastPublisher: Send + Sync {
    /// Fire-and-forget publish of a raw payload.
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}

/// Serialize `message` as JSON and publish it.
pub async fn publish_json<M: Serialize + Sync>(
    publisher: &dyn BroadcastPublisher,
    subject: String,
    message: &M,
) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    publisher.publish(subject, Bytes::from(payload)).await
}

pub struct NatsBroadcast {
    client: async_nats::Client,
}

impl NatsBroadcast {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BroadcastPublisher for NatsBroadcast {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client.publish(subject, payload).await?;
        Ok(())
    }
}

/// Used when no NATS server is configured.
#[derive(Default)]
pub struct LogOnlyBroadcast;

#[async_trait]
impl BroadcastPublisher for LogOnlyBroadcast {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        tracing::debug!(
            subject = %subject,
            payload = %String::from_utf8_lossy(&payload),
            "broadcast (no transport configured)"
        );
        Ok(())
    }
}

/// Records every published message so tests can assert on deliveries.
#[derive(Default)]
pub struct TestBroadcast {
    published: RwLock<Vec<PublishedMessage>>,
}

impl TestBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    pub fn was_published_to(&self, subject: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.subject == subject)
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deserialize a published message payload as JSON.
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl BroadcastPublisher for TestBroadcast {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
        Ok(())
    }
}
