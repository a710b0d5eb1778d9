//! Generation-independent engine capability.

use std::sync::Arc;

use async_trait::async_trait;
use dagrun_types::{RunStatus, WorkflowRun};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::protocol::{EngineGeneration, TriggerOutcome, WireProtocol};

/// Shared engine handle.
pub type SharedEngine = Arc<dyn ExecutionEngine>;

/// What the orchestrator needs from an execution engine.
///
/// Calls are awaited inline by the request that issues them and are bounded
/// by the engine's request timeout. Nothing is retried here.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Wire protocol this engine speaks.
    fn protocol(&self) -> &dyn WireProtocol;

    fn generation(&self) -> EngineGeneration {
        self.protocol().generation()
    }

    /// Start a run.
    async fn trigger(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
        correlation_id: &str,
    ) -> Result<TriggerOutcome>;

    /// Poll the live status of a run by its correlation token.
    async fn fetch_status(&self, run: &WorkflowRun) -> Result<RunStatus>;
}

/// Build the `conf` object handed to the engine.
///
/// The caller's conf (an object, or null for none) is extended with the run
/// id and correlation id so DAG tasks can report back.
pub fn engine_conf(conf: &Value, run_id: &str, correlation_id: &str) -> Value {
    let mut map = match conf {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    map.insert("run_id".to_string(), Value::String(run_id.to_string()));
    map.insert(
        "correlation_id".to_string(),
        Value::String(correlation_id.to_string()),
    );
    Value::Object(map)
}
