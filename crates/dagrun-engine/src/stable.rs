//! Generation-2 ("stable") wire protocol.
//!
//! Runs are keyed by the caller's run id. The engine refuses a second run
//! with the same id for a workflow (HTTP 409).

use serde_json::{json, Value};

use crate::error::Result;
use crate::protocol::{
    required_str, segment, EngineGeneration, TriggerOutcome, TriggerRequest, WireProtocol,
};

/// Run-id-correlated protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableProtocol;

impl WireProtocol for StableProtocol {
    fn generation(&self) -> EngineGeneration {
        EngineGeneration::Stable
    }

    fn rejects_duplicate_run_ids(&self) -> bool {
        true
    }

    fn build_trigger_request(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
    ) -> TriggerRequest {
        TriggerRequest {
            path: format!("api/v1/dags/{}/dagRuns", segment(workflow_name)),
            body: json!({
                "dag_run_id": run_id,
                "conf": conf,
            }),
        }
    }

    fn parse_trigger_response(&self, raw: &Value) -> Result<TriggerOutcome> {
        let run_id = required_str(raw, "dag_run_id")?.to_string();
        Ok(TriggerOutcome {
            correlation_token: run_id.clone(),
            run_id,
        })
    }

    fn status_path(&self, workflow_name: &str, key: &str) -> String {
        format!(
            "api/v1/dags/{}/dagRuns/{}",
            segment(workflow_name),
            segment(key)
        )
    }

    /// Engine DAG ids double as module names, so anything outside
    /// `[A-Za-z0-9_]` becomes `_`.
    fn definition_file_name(&self, workflow_name: &str) -> String {
        let module: String = workflow_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!("{}.py", module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagrun_types::{RequestContext, Workflow, WorkflowRun};

    #[test]
    fn test_trigger_payload_carries_run_id() {
        let req = StableProtocol.build_trigger_request("w", "r1", &json!({"k": "v"}));
        assert_eq!(req.path, "api/v1/dags/w/dagRuns");
        assert_eq!(req.body, json!({ "dag_run_id": "r1", "conf": { "k": "v" } }));
    }

    #[test]
    fn test_correlation_token_is_run_id() {
        let raw = json!({
            "dag_run_id": "r1",
            "dag_id": "w",
            "logical_date": "2024-05-01T10:00:00+00:00",
            "state": "queued",
        });
        let outcome = StableProtocol.parse_trigger_response(&raw).unwrap();
        assert_eq!(outcome.correlation_token, "r1");
        assert_eq!(outcome.run_id, "r1");
    }

    #[test]
    fn test_status_key_is_correlation_token() {
        let ctx = RequestContext::new("t", "c", "u");
        let wf = Workflow::new("w", &ctx, dagrun_types::now());
        let run = WorkflowRun::submitted(&wf, "r1", "r1", "u", dagrun_types::now());
        assert_eq!(StableProtocol.status_query_key(&run), "r1");
        assert_eq!(StableProtocol.status_path("w", "r 1"), "api/v1/dags/w/dagRuns/r%201");
    }

    #[test]
    fn test_definition_file_name_sanitizes() {
        assert_eq!(
            StableProtocol.definition_file_name("csv-ingest.v2"),
            "csv_ingest_v2.py"
        );
    }
}
