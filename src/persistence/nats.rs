use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use tracing::info;

use super::record::SessionRecord;
use super::SessionSink;
use crate::error::PersistenceError;

/// Publishes completed sessions as JSON to a NATS subject
pub struct NatsSessionSink {
    client: Client,
    subject: String,
}

impl NatsSessionSink {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self::with_client(client, subject))
    }

    pub fn with_client(client: Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl SessionSink for NatsSessionSink {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec(record)?;
        let bytes = payload.len();

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| PersistenceError::Publish(e.to_string()))?;

        self.client
            .flush()
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        info!(
            "Published session {} to {} (user={}, answers={}, bytes={})",
            record.session.id,
            self.subject,
            record.user_id,
            record.answers.len(),
            bytes
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}
