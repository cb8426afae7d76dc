use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::event::Envelope;
use super::queue::{Batch, DeliveryOutcome};
use crate::error::TransportError;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Performs one POST of an encoded batch and reports the response status.
/// Implementations own their timeouts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: &str, body: String) -> Result<u16, TransportError>;
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn encode_batch(events: &[Envelope]) -> Result<String, TransportError> {
    Ok(serde_json::to_string(events)?)
}

/// Ships batches to the configured endpoint. Retried batches are encoded
/// identically to the original attempt; no retry-specific headers exist.
#[derive(Clone)]
pub struct DeliveryManager {
    transport: Arc<dyn Transport>,
    endpoint: String,
}

impl DeliveryManager {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn deliver(&self, batch: &Batch) -> DeliveryOutcome {
        match self.try_deliver(batch).await {
            Ok(()) => {
                debug!(batch = batch.id(), events = batch.len(), "batch delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(batch = batch.id(), events = batch.len(), error = %e, "batch delivery failed, requeueing");
                DeliveryOutcome::Failed
            }
        }
    }

    async fn try_deliver(&self, batch: &Batch) -> Result<(), TransportError> {
        let body = encode_batch(batch.events())?;
        let status = self.transport.post(&self.endpoint, body).await?;
        if !is_success(status) {
            return Err(TransportError::Status(status));
        }
        Ok(())
    }
}
