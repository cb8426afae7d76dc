use thiserror::Error;

use crate::kernel::source::SignalKind;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("observation source unavailable for {kind:?}: {reason}")]
    ObservationUnavailable { kind: SignalKind, reason: String },

    #[error("no tokio runtime available to drive the agent")]
    NoRuntime,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Delivery failures. Never surfaced to the embedding application except through
/// the outcome of an explicit flush.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("non-success response status: {0}")]
    Status(u16),

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage is unavailable in this host")]
    Unavailable,

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
