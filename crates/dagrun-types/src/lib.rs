//! Shared types for the dagrun workflow-run orchestrator.
//!
//! Holds the persisted data model ([`Workflow`], [`WorkflowRun`]), the run
//! status state machine ([`RunStatus`], [`validate_transition`]) and the
//! identifier rules every layer agrees on.

pub mod context;
pub mod error;
pub mod ids;
pub mod status;
pub mod workflow;

pub use context::RequestContext;
pub use error::{Result, ValidationError};
pub use ids::{
    generate_run_id, validate_run_id, validate_workflow_name, MAX_IDENTIFIER_LEN,
    RESERVED_RUN_PREFIX,
};
pub use status::{validate_target, validate_transition, RunStatus, Transition, UnknownStatus};
pub use workflow::{Workflow, WorkflowRun, DAG_CONTENT_KEY};

/// Timestamp type used throughout the model.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
