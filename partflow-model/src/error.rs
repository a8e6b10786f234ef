//! Error types for the model layer.

use crate::EntityId;
use partflow_store::StoreError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Underlying store failure (not initialized, bad path, conflict).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No bucket holds an entity with this id.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The operation needs an `id` field and the entity has none.
    #[error("entity has no id")]
    MissingId,

    /// The value is not a JSON object.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
