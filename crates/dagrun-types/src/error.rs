//! Validation errors raised before any collaborator is touched.

use crate::status::RunStatus;

/// Result type alias for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors from local validation of identifiers and status transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The requested status can only be set at trigger time.
    #[error("status {requested} cannot be requested; allowed targets are {}", RunStatus::update_targets_display())]
    InvalidTarget { requested: RunStatus },

    /// The run already reached a terminal status.
    #[error("run is already {current}; cannot move to {requested}")]
    TerminalRun {
        current: RunStatus,
        requested: RunStatus,
    },

    /// The run id uses the reserved backfill prefix.
    #[error("run id '{0}' uses the reserved 'backfill' prefix")]
    ReservedPrefix(String),

    /// An identifier broke the character or length rules.
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    /// True when the error describes a conflict with stored state rather
    /// than a malformed request.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ValidationError::TerminalRun { .. })
    }
}
