//! Engine client error types.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors talking to the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached or did not answer in time.
    #[error("Engine unreachable: {0}")]
    Unreachable(String),

    /// The engine already has a run with this id.
    #[error("Run '{run_id}' already exists on the engine")]
    Conflict { run_id: String },

    /// The engine does not know the workflow or run.
    #[error("Not found on engine: {0}")]
    NotFound(String),

    /// The engine returned a non-success status.
    #[error("Engine error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The engine answered with a body we cannot interpret.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the caller may retry the request.
    ///
    /// Transport failures and engine-side 5xx answers are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Unreachable(_) => true,
            EngineError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            EngineError::Config(err.to_string())
        } else {
            EngineError::Unreachable(err.to_string())
        }
    }
}
