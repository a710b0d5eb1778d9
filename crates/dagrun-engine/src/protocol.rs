//! Wire-protocol strategy shared by both engine generations.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dagrun_types::{RunStatus, WorkflowRun};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::experimental::ExperimentalProtocol;
use crate::stable::StableProtocol;

// ─────────────────────────────────────────────────────────────────────────────
// Generation selection
// ─────────────────────────────────────────────────────────────────────────────

/// Engine wire-protocol generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineGeneration {
    /// Generation 1: timestamp-correlated experimental API.
    #[serde(alias = "v1")]
    Experimental,
    /// Generation 2: run-id-correlated stable API.
    #[default]
    #[serde(alias = "v2")]
    Stable,
}

impl EngineGeneration {
    /// Build the protocol strategy for this generation.
    pub fn protocol(self) -> Arc<dyn WireProtocol> {
        match self {
            EngineGeneration::Experimental => Arc::new(ExperimentalProtocol),
            EngineGeneration::Stable => Arc::new(StableProtocol),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineGeneration::Experimental => "experimental",
            EngineGeneration::Stable => "stable",
        }
    }
}

impl fmt::Display for EngineGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineGeneration {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "experimental" | "v1" => Ok(EngineGeneration::Experimental),
            "stable" | "v2" => Ok(EngineGeneration::Stable),
            other => Err(EngineError::Config(format!(
                "unknown engine generation '{}'",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Pre-resolved credential material for the engine.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Bearer { .. } => f.write_str("Bearer(***)"),
            Credentials::Basic { username, .. } => write!(f, "Basic({}:***)", username),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trigger request/response
// ─────────────────────────────────────────────────────────────────────────────

/// A trigger call ready to send: relative path plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub path: String,
    pub body: Value,
}

/// What the engine told us about a new run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// Key used for every later status poll.
    pub correlation_token: String,
    /// Run id as the engine recorded it.
    pub run_id: String,
}

/// Generation-specific encoding of engine requests and responses.
///
/// Implementations are pure; transport lives in [`crate::HttpEngine`].
pub trait WireProtocol: Send + Sync + fmt::Debug {
    fn generation(&self) -> EngineGeneration;

    /// Whether the engine itself rejects a reused run id.
    fn rejects_duplicate_run_ids(&self) -> bool;

    /// Build the trigger call for a run.
    fn build_trigger_request(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
    ) -> TriggerRequest;

    /// Extract correlation token and run id from a trigger answer.
    fn parse_trigger_response(&self, raw: &Value) -> Result<TriggerOutcome>;

    /// Key the engine expects when polling this run.
    fn status_query_key<'a>(&self, run: &'a WorkflowRun) -> &'a str {
        &run.correlation_token
    }

    /// Relative path of the status endpoint for a query key.
    fn status_path(&self, workflow_name: &str, key: &str) -> String;

    /// Extract the run status from a status answer, normalizing `SUCCESS`.
    fn parse_status_response(&self, raw: &Value) -> Result<RunStatus> {
        let state = required_str(raw, "state")?;
        state
            .parse::<RunStatus>()
            .map(RunStatus::normalize)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    /// File name under which the workflow's definition is deployed.
    fn definition_file_name(&self, workflow_name: &str) -> String;
}

/// Read a required string field from an engine answer.
pub(crate) fn required_str<'a>(raw: &'a Value, field: &str) -> Result<&'a str> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::InvalidResponse(format!("missing '{}' in {}", field, raw)))
}

pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
