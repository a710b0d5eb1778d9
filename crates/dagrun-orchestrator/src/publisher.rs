//! Run lifecycle event publishing.

use async_trait::async_trait;
use dagrun_types::RunStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for publishing.
pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    /// A batch must carry at least one event.
    #[error("Event batch is empty")]
    EmptyBatch,

    /// A required attribute is empty.
    #[error("Missing event attribute: {0}")]
    MissingAttribute(&'static str),

    /// The bus did not accept the batch.
    #[error("Publish failed: {0}")]
    Transport(String),
}

/// A run changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusEvent {
    pub run_id: String,
    pub correlation_id: String,
    pub status: RunStatus,
}

/// Message attributes sent alongside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttributes {
    pub partition_id: String,
    pub correlation_id: String,
}

impl EventAttributes {
    /// Check the attributes every batch needs.
    pub fn validate(&self) -> Result<()> {
        if self.partition_id.is_empty() {
            return Err(PublishError::MissingAttribute("partitionId"));
        }
        if self.correlation_id.is_empty() {
            return Err(PublishError::MissingAttribute("correlationId"));
        }
        Ok(())
    }
}

/// Fan-out of run status events to the event bus.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(
        &self,
        events: &[RunStatusEvent],
        attributes: &EventAttributes,
    ) -> Result<()>;
}
