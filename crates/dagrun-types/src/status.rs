//! Run status state machine.
//!
//! ```text
//!   QUEUED ─┐
//!           ├──> RUNNING ──> FINISHED
//! SUBMITTED ┘        └─────> FAILED
//! ```
//!
//! `QUEUED` and `SUBMITTED` are entry states written only at trigger time.
//! `SUCCESS` is an engine spelling of `FINISHED` and is normalized on the way
//! in. `FINISHED` and `FAILED` are terminal: nothing moves out of them, not
//! even a repeat of the same status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Submitted,
    Running,
    Success,
    Finished,
    Failed,
}

impl RunStatus {
    /// Statuses a caller may request through an update.
    pub const UPDATE_TARGETS: [RunStatus; 3] =
        [RunStatus::Running, RunStatus::Finished, RunStatus::Failed];

    /// Map engine aliases onto the canonical status.
    pub fn normalize(self) -> Self {
        match self {
            RunStatus::Success => RunStatus::Finished,
            other => other,
        }
    }

    /// True for statuses no transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(self.normalize(), RunStatus::Finished | RunStatus::Failed)
    }

    /// True for statuses only the orchestrator sets, at trigger time.
    pub fn is_entry_only(self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::Submitted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "QUEUED",
            RunStatus::Submitted => "SUBMITTED",
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub(crate) fn update_targets_display() -> String {
        let names: Vec<&str> = Self::UPDATE_TARGETS.iter().map(|s| s.as_str()).collect();
        format!("[{}]", names.join(", "))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownStatus;

    /// Parses both the canonical upper-case names and engine lower-case
    /// spellings (`"running"`, `"success"`, ...).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(RunStatus::Queued),
            "SUBMITTED" => Ok(RunStatus::Submitted),
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FINISHED" => Ok(RunStatus::Finished),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// An accepted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RunStatus,
    pub to: RunStatus,
}

impl Transition {
    /// Whether the run's end timestamp must be stamped.
    pub fn ends_run(&self) -> bool {
        self.to.is_terminal()
    }
}

/// Check that `requested` may be asked for at all, whatever the run's state.
///
/// Returns the normalized target.
pub fn validate_target(requested: RunStatus) -> Result<RunStatus> {
    let requested = requested.normalize();
    if requested.is_entry_only() {
        return Err(ValidationError::InvalidTarget { requested });
    }
    Ok(requested)
}

/// Check whether a run in `current` may move to `requested`.
///
/// Entry-only targets are rejected first, so such a request is always an
/// invalid request regardless of the current state. A terminal `current`
/// then rejects everything as a conflict.
pub fn validate_transition(current: RunStatus, requested: RunStatus) -> Result<Transition> {
    let requested = validate_target(requested)?;

    let current = current.normalize();
    if current.is_terminal() {
        return Err(ValidationError::TerminalRun { current, requested });
    }

    Ok(Transition {
        from: current,
        to: requested,
    })
}
