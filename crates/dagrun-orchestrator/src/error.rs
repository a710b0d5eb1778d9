//! Orchestrator error types.

use dagrun_config::ConfigError;
use dagrun_engine::EngineError;
use dagrun_types::ValidationError;
use thiserror::Error;

use crate::cursor::CursorError;
use crate::store::StoreError;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request is malformed. Raised before any collaborator call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The workflow or run does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request conflicts with existing state.
    #[error("Conflict on '{id}': {message}")]
    Conflict { id: String, message: String },

    /// The engine could not be reached or timed out. Safe to retry.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    /// The engine rejected or garbled the request.
    #[error("Engine error: {0}")]
    Engine(#[source] EngineError),

    /// The persistence backend failed.
    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// Engine configuration could not be resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A cursor or similar opaque argument is unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl OrchestratorError {
    /// A validation failure for a request that names no stored record.
    pub fn invalid(err: ValidationError) -> Self {
        OrchestratorError::InvalidRequest(err.to_string())
    }

    /// A validation failure against the stored record `id`.
    pub fn rejected(id: &str, err: ValidationError) -> Self {
        if err.is_conflict() {
            OrchestratorError::Conflict {
                id: id.to_string(),
                message: err.to_string(),
            }
        } else {
            OrchestratorError::InvalidRequest(err.to_string())
        }
    }

    pub fn conflict(id: impl Into<String>, message: impl Into<String>) -> Self {
        OrchestratorError::Conflict {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::EngineUnavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OrchestratorError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_))
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, OrchestratorError::InvalidRequest(_))
    }
}

impl From<EngineError> for OrchestratorError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Conflict { run_id } => OrchestratorError::Conflict {
                message: format!("run '{}' already exists on the engine", run_id),
                id: run_id,
            },
            EngineError::NotFound(what) => OrchestratorError::NotFound(what),
            err if err.is_retryable() => OrchestratorError::EngineUnavailable(err),
            err => OrchestratorError::Engine(err),
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => OrchestratorError::NotFound(what),
            StoreError::AlreadyExists(id) => OrchestratorError::Conflict {
                message: format!("'{}' already exists", id),
                id,
            },
            StoreError::InvalidToken(msg) => OrchestratorError::InvalidArgument(msg),
            err => OrchestratorError::Persistence(err),
        }
    }
}

impl From<CursorError> for OrchestratorError {
    fn from(err: CursorError) -> Self {
        OrchestratorError::InvalidArgument(err.to_string())
    }
}
