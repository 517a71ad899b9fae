//! Session persistence boundary
//!
//! Completed sessions are handed to a `SessionSink` exactly once, fire and
//! forget. Sinks report failures; callers log them and move on.

mod nats;
mod record;

pub use nats::NatsSessionSink;
pub use record::SessionRecord;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PersistenceError;

#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError>;

    fn name(&self) -> &str;
}

/// Sink that only logs the completed session
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSessionSink;

#[async_trait]
impl SessionSink for TracingSessionSink {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        info!(
            "Session {} completed for {}: {:.2} ({}) over {} answers",
            record.session.id,
            record.user_id,
            record.overall_score,
            record.grade,
            record.answers.len()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// NATS server URL; sessions are only logged when unset
    pub nats_url: Option<String>,
    pub subject: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            nats_url: None,
            subject: "interview.session.completed".to_string(),
        }
    }
}

/// Build the configured sink, falling back to logging when NATS is unreachable
pub async fn connect_sink(config: &PersistenceConfig) -> Arc<dyn SessionSink> {
    match &config.nats_url {
        Some(url) => match NatsSessionSink::connect(url, config.subject.clone()).await {
            Ok(sink) => {
                info!("Completed sessions publish to {}", sink.subject());
                Arc::new(sink)
            }
            Err(e) => {
                warn!("Session persistence disabled, NATS unavailable: {:#}", e);
                Arc::new(TracingSessionSink)
            }
        },
        None => Arc::new(TracingSessionSink),
    }
}
