//! Run lifecycle against in-memory collaborators and mock engines.

mod common;

use common::{ctx, tenant_b_ctx, Harness, TENANT_B_URL};
use dagrun_engine::{EngineGeneration, ExecutionEngine};
use dagrun_orchestrator::{
    CreateWorkflowRequest, InMemoryRepository, ListRunsRequest, OrchestratorError, RequestContext,
    RunFilter, RunStatus, TriggerRunRequest,
};
use serde_json::json;

fn with_id(id: &str) -> TriggerRunRequest {
    TriggerRunRequest::new().with_run_id(id)
}

// ─────────────────────────────────────────────────────────────────────────────
// trigger_run
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stable_double_trigger_conflicts_on_run_id() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    let runs = h.services.runs();

    let run = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();
    assert_eq!(run.status, RunStatus::Submitted);
    assert_eq!(run.correlation_token, "r1");
    assert!(run.end_time_stamp.is_none());

    let err = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict { ref id, .. } if id == "r1"));
    assert_eq!(h.repo.runs("w").len(), 1);
}

#[tokio::test]
async fn test_stable_engine_is_backstop_when_lookup_fails() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    let runs = h.services.runs();
    runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();

    h.repo.set_fail_reads(true);
    let err = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict { ref id, .. } if id == "r1"));

    // a fresh id still goes through despite the failing lookup
    runs.trigger_run(&ctx(), "w", with_id("r2")).await.unwrap();
    assert_eq!(h.engine().triggers().len(), 2);
}

#[tokio::test]
async fn test_experimental_duplicate_caught_before_engine() {
    let h = Harness::new(EngineGeneration::Experimental);
    h.register("w").await;
    let runs = h.services.runs();

    runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();
    let err = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict { ref id, .. } if id == "r1"));
    assert_eq!(h.engine().triggers().len(), 1);
}

#[tokio::test]
async fn test_experimental_lookup_failure_aborts() {
    let h = Harness::new(EngineGeneration::Experimental);
    h.register("w").await;
    h.repo.set_fail_reads(true);

    let err = h
        .services
        .runs()
        .trigger_run(&ctx(), "w", with_id("r1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Persistence(_)));
    assert!(h.engine().triggers().is_empty());
}

#[tokio::test]
async fn test_experimental_run_keyed_by_execution_date() {
    let h = Harness::new(EngineGeneration::Experimental);
    h.register("w").await;

    let run = h
        .services
        .runs()
        .trigger_run(&ctx(), "w", with_id("r1"))
        .await
        .unwrap();
    let call = &h.engine().triggers()[0];
    assert_eq!(call.path, "api/experimental/dags/w/dag_runs");
    assert_eq!(call.body["execution_date"], run.correlation_token.as_str());
    assert_ne!(run.correlation_token, "r1");
}

#[tokio::test]
async fn test_backfill_prefix_rejected_on_both_generations() {
    for generation in [EngineGeneration::Experimental, EngineGeneration::Stable] {
        let h = Harness::new(generation);
        h.register("w").await;

        let err = h
            .services
            .runs()
            .trigger_run(&ctx(), "w", with_id("backfill-1"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_request(), "{generation}: {err}");
        assert!(h.engine().triggers().is_empty());
    }
}

#[tokio::test]
async fn test_invalid_requests_touch_nothing() {
    let h = Harness::new(EngineGeneration::Stable);
    let runs = h.services.runs();

    // checked before the (missing) workflow is looked up
    let err = runs
        .trigger_run(&ctx(), "missing", TriggerRunRequest::new().with_conf(json!([1, 2])))
        .await
        .unwrap_err();
    assert!(err.is_invalid_request());

    let err = runs
        .trigger_run(&ctx(), "bad name", TriggerRunRequest::new())
        .await
        .unwrap_err();
    assert!(err.is_invalid_request());

    let err = runs
        .trigger_run(&ctx(), "missing", TriggerRunRequest::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_generated_run_id_and_forwarded_conf() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;

    let run = h
        .services
        .runs()
        .trigger_run(
            &ctx(),
            "w",
            TriggerRunRequest::new().with_conf(json!({ "file": "a.csv" })),
        )
        .await
        .unwrap();
    assert_eq!(run.run_id.len(), 36);
    assert_eq!(run.submitted_by, "alice@example.com");

    let call = &h.engine().triggers()[0];
    assert_eq!(call.correlation_id, "corr-1");
    assert_eq!(
        call.body["conf"],
        json!({ "file": "a.csv", "run_id": run.run_id, "correlation_id": "corr-1" })
    );
}

#[tokio::test]
async fn test_engine_outage_persists_nothing() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    h.engine().set_unreachable(true);

    let err = h
        .services
        .runs()
        .trigger_run(&ctx(), "w", with_id("r1"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.repo.runs("w").is_empty());
}

#[tokio::test]
async fn test_tenant_and_system_engines_are_routed() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    h.services
        .workflows()
        .create_workflow(&ctx(), CreateWorkflowRequest::new("sys").system())
        .await
        .unwrap();
    let runs = h.services.runs();

    runs.trigger_run(&tenant_b_ctx(), "w", with_id("r1"))
        .await
        .unwrap();
    let tenant = h.tenant_engine(TENANT_B_URL);
    assert_eq!(tenant.generation(), EngineGeneration::Experimental);
    assert_eq!(tenant.triggers().len(), 1);

    runs.trigger_run(&tenant_b_ctx(), "sys", with_id("s1"))
        .await
        .unwrap();
    assert_eq!(h.system_engine().triggers().len(), 1);
    assert!(h.engine().triggers().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// get_run
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_run_merges_live_status() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    let runs = h.services.runs();
    runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();
    let engine = h.engine();

    // the engine reports QUEUED at first, which is never merged
    let run = runs.get_run(&ctx(), "w", "r1").await.unwrap();
    assert_eq!(run.status, RunStatus::Submitted);

    engine.set_run_status("r1", RunStatus::Running);
    let run = runs.get_run(&ctx(), "w", "r1").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.end_time_stamp.is_none());
    assert_eq!(h.repo.runs("w")[0].status, RunStatus::Running);

    engine.set_run_status("r1", RunStatus::Success);
    let run = runs.get_run(&ctx(), "w", "r1").await.unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert!(run.end_time_stamp.is_some());

    let polls = engine.poll_count();
    let again = runs.get_run(&ctx(), "w", "r1").await.unwrap();
    assert_eq!(again, run);
    assert_eq!(engine.poll_count(), polls, "terminal runs are not polled");
}

#[tokio::test]
async fn test_get_run_poll_failure_returns_stored_run() {
    let h = Harness::new(EngineGeneration::Experimental);
    h.register("w").await;
    let runs = h.services.runs();
    let stored = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();

    h.engine().set_unreachable(true);
    let run = runs.get_run(&ctx(), "w", "r1").await.unwrap();
    assert_eq!(run, stored);
}

#[tokio::test]
async fn test_get_run_unresolvable_tenant_returns_stored_run() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    let runs = h.services.runs();
    let stored = runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();
    h.engine().set_run_status("r1", RunStatus::Running);

    let unknown = RequestContext::new("tenant-down", "corr-x", "carol@example.com");
    let run = runs.get_run(&unknown, "w", "r1").await.unwrap();
    assert_eq!(run, stored);
    assert_eq!(h.engine().poll_count(), 0);
    assert_eq!(h.repo.runs("w")[0].status, RunStatus::Submitted);
}

#[tokio::test]
async fn test_get_run_does_not_overwrite_update_made_during_poll() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    let runs = h.services.runs();
    runs.trigger_run(&ctx(), "w", with_id("r1")).await.unwrap();
    h.engine().set_run_status("r1", RunStatus::Running);
    h.poll_gate().arm();

    let caller = ctx();
    let (polled, updated) = tokio::join!(runs.get_run(&caller, "w", "r1"), async {
        h.poll_gate().entered().await;
        let updated = runs.update_run(&caller, "w", "r1", RunStatus::Finished).await;
        h.poll_gate().release();
        updated
    });

    let updated = updated.unwrap();
    let polled = polled.unwrap();
    assert_eq!(polled, updated);

    let stored = &h.repo.runs("w")[0];
    assert_eq!(stored.status, RunStatus::Finished);
    assert!(stored.end_time_stamp.is_some());
}

#[tokio::test]
async fn test_get_unknown_run_is_not_found() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;

    let err = h
        .services
        .runs()
        .get_run(&ctx(), "w", "nope")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ─────────────────────────────────────────────────────────────────────────────
// list_runs
// ─────────────────────────────────────────────────────────────────────────────

async fn trigger_all(h: &Harness, ids: &[&str]) {
    for id in ids {
        h.services
            .runs()
            .trigger_run(&ctx(), "w", with_id(id))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_list_runs_pages_with_cursor() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["r1", "r2", "r3"]).await;
    let runs = h.services.runs();

    let first = runs.list_runs("w", ListRunsRequest::new(2)).await.unwrap();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next_cursor.expect("full page carries a cursor");
    assert!(!cursor.contains('{'), "cursor is opaque");

    let second = runs
        .list_runs("w", ListRunsRequest::new(2).with_cursor(cursor))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].run_id, "r3");
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_list_runs_rejects_bad_arguments() {
    let h = Harness::new(EngineGeneration::Stable);
    let runs = h.services.runs();

    for limit in [0, 101] {
        let err = runs
            .list_runs("w", ListRunsRequest::new(limit))
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());
    }

    let err = runs
        .list_runs("w", ListRunsRequest::new(10).with_cursor("%%%"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_client_side_filter_fills_page() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["a1", "b1", "b2", "a2", "a3"]).await;
    let runs = h.services.runs();
    let filter = RunFilter::default().with_run_id_prefix("a");

    let first = runs
        .list_runs("w", ListRunsRequest::new(2).with_filter(filter.clone()))
        .await
        .unwrap();
    let ids: Vec<_> = first.items.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
    assert_eq!(h.repo.list_calls(), 3);

    let second = runs
        .list_runs(
            "w",
            ListRunsRequest::new(2)
                .with_filter(filter)
                .with_cursor(first.next_cursor.unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].run_id, "a3");
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_filter_pushdown_uses_single_call() {
    let h = Harness::with_repo(
        EngineGeneration::Stable,
        InMemoryRepository::new().with_filter_pushdown(true),
    );
    h.register("w").await;
    trigger_all(&h, &["a1", "b1", "b2", "a2", "a3"]).await;

    let page = h
        .services
        .runs()
        .list_runs(
            "w",
            ListRunsRequest::new(2).with_filter(RunFilter::default().with_run_id_prefix("a")),
        )
        .await
        .unwrap();
    let ids: Vec<_> = page.items.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
    assert!(page.next_cursor.is_some());
    assert_eq!(h.repo.list_calls(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// update_run
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_run_stamps_end_only_when_terminal() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["r1"]).await;
    let runs = h.services.runs();

    let run = runs
        .update_run(&ctx(), "w", "r1", RunStatus::Running)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.end_time_stamp.is_none());

    let run = runs
        .update_run(&ctx(), "w", "r1", RunStatus::Finished)
        .await
        .unwrap();
    assert!(run.end_time_stamp.is_some());
    assert_eq!(h.repo.runs("w")[0], run);

    let events = h.publisher.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].run_id, "r1");
    assert_eq!(events[1].correlation_id, "corr-1");
    assert_eq!(events[1].status, RunStatus::Finished);
    assert_eq!(h.publisher.batches()[0].attributes.partition_id, "tenant-a");
}

#[tokio::test]
async fn test_update_terminal_run_conflicts() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["r1"]).await;
    let runs = h.services.runs();
    runs.update_run(&ctx(), "w", "r1", RunStatus::Failed)
        .await
        .unwrap();

    for requested in [RunStatus::Running, RunStatus::Finished, RunStatus::Failed] {
        let err = runs
            .update_run(&ctx(), "w", "r1", requested)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict { ref id, .. } if id == "r1"));
    }
    assert_eq!(h.publisher.events().len(), 1);
}

#[tokio::test]
async fn test_entry_only_targets_are_invalid() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["r1"]).await;
    let runs = h.services.runs();

    for requested in [RunStatus::Submitted, RunStatus::Queued] {
        let err = runs
            .update_run(&ctx(), "w", "r1", requested)
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());

        // even for a run that does not exist
        let err = runs
            .update_run(&ctx(), "w", "ghost", requested)
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());
    }
}

#[tokio::test]
async fn test_publisher_failure_does_not_fail_update() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;
    trigger_all(&h, &["r1"]).await;
    h.publisher.set_fail(true);

    let run = h
        .services
        .runs()
        .update_run(&ctx(), "w", "r1", RunStatus::Running)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(h.repo.runs("w")[0].status, RunStatus::Running);
    assert!(h.publisher.batches().is_empty());
}

#[tokio::test]
async fn test_update_unknown_run_is_not_found() {
    let h = Harness::new(EngineGeneration::Stable);
    h.register("w").await;

    let err = h
        .services
        .runs()
        .update_run(&ctx(), "w", "ghost", RunStatus::Running)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
