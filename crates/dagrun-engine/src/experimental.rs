//! Generation-1 ("experimental") wire protocol.
//!
//! Runs are keyed by execution timestamp. Two triggers inside the same
//! second would collapse into one run unless the payload pins an explicit
//! microsecond timestamp, so every trigger carries one and asks the engine
//! not to strip the fractional part.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::Result;
use crate::protocol::{
    required_str, segment, EngineGeneration, TriggerOutcome, TriggerRequest, WireProtocol,
};

/// Timestamp-correlated protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExperimentalProtocol;

impl WireProtocol for ExperimentalProtocol {
    fn generation(&self) -> EngineGeneration {
        EngineGeneration::Experimental
    }

    fn rejects_duplicate_run_ids(&self) -> bool {
        false
    }

    fn build_trigger_request(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
    ) -> TriggerRequest {
        let execution_date = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        TriggerRequest {
            path: format!("api/experimental/dags/{}/dag_runs", segment(workflow_name)),
            body: json!({
                "run_id": run_id,
                "conf": conf,
                "execution_date": execution_date,
                "replace_microseconds": "false",
            }),
        }
    }

    fn parse_trigger_response(&self, raw: &Value) -> Result<TriggerOutcome> {
        Ok(TriggerOutcome {
            correlation_token: required_str(raw, "execution_date")?.to_string(),
            run_id: required_str(raw, "run_id")?.to_string(),
        })
    }

    fn status_path(&self, workflow_name: &str, key: &str) -> String {
        format!(
            "api/experimental/dags/{}/dag_runs/{}",
            segment(workflow_name),
            segment(key)
        )
    }

    fn definition_file_name(&self, workflow_name: &str) -> String {
        format!("{}.py", workflow_name)
    }
}
