//! Workflow metadata and run records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::Result;
use crate::status::{validate_transition, RunStatus, Transition};
use crate::Timestamp;

/// Registration instruction key holding engine definition source.
pub const DAG_CONTENT_KEY: &str = "dagContent";

/// A registered workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    /// Immutable once created.
    pub workflow_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
    pub creation_timestamp: Timestamp,
    pub version: i64,
    #[serde(default)]
    pub registration_instructions: HashMap<String, String>,
    #[serde(default)]
    pub is_system_workflow: bool,
    #[serde(default)]
    pub is_deployed_through_service: bool,
}

impl Workflow {
    /// Create workflow metadata owned by the caller in `ctx`.
    ///
    /// The version is the creation time in epoch milliseconds.
    pub fn new(name: impl Into<String>, ctx: &RequestContext, now: Timestamp) -> Self {
        let name = name.into();
        Self {
            workflow_id: name.clone(),
            workflow_name: name,
            description: None,
            created_by: ctx.user.clone(),
            creation_timestamp: now,
            version: now.timestamp_millis(),
            registration_instructions: HashMap::new(),
            is_system_workflow: false,
            is_deployed_through_service: false,
        }
    }

    /// Engine definition source carried in the registration instructions.
    pub fn dag_content(&self) -> Option<&str> {
        self.registration_instructions
            .get(DAG_CONTENT_KEY)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// One triggered execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub run_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub start_time_stamp: Timestamp,
    #[serde(default)]
    pub end_time_stamp: Option<Timestamp>,
    pub status: RunStatus,
    pub submitted_by: String,
    /// Engine key used to poll status. Written once, at trigger time.
    pub correlation_token: String,
}

impl WorkflowRun {
    /// A freshly triggered run in `SUBMITTED`.
    pub fn submitted(
        workflow: &Workflow,
        run_id: impl Into<String>,
        correlation_token: impl Into<String>,
        submitted_by: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id: workflow.workflow_id.clone(),
            workflow_name: workflow.workflow_name.clone(),
            start_time_stamp: now,
            end_time_stamp: None,
            status: RunStatus::Submitted,
            submitted_by: submitted_by.into(),
            correlation_token: correlation_token.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate and apply a status change.
    ///
    /// The end timestamp is stamped only when the new status is terminal.
    /// On rejection the run is left untouched.
    pub fn apply_status(&mut self, requested: RunStatus, now: Timestamp) -> Result<Transition> {
        let transition = validate_transition(self.status, requested)?;
        self.status = transition.to;
        if transition.ends_run() {
            self.end_time_stamp = Some(now);
        }
        Ok(transition)
    }
}
