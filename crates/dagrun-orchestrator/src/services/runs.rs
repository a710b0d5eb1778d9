//! Run orchestration: trigger, poll, list, update and bulk delete.

use std::sync::Arc;

use dagrun_config::ConfigResolver;
use dagrun_types::{
    generate_run_id, validate_run_id, validate_target, validate_workflow_name, RequestContext,
    RunStatus, Workflow, WorkflowRun,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cursor;
use crate::error::{OrchestratorError, Result};
use crate::publisher::{EventAttributes, RunStatusEvent, StatusPublisher};
use crate::store::{RunFilter, RunPage, RunRepository};

use super::engine_for;

/// Largest page `list_runs` will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when sweeping every run of a workflow.
const SWEEP_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// Body of a trigger request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRunRequest {
    /// Caller-chosen run id. Generated when absent.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Parameters handed to the workflow. Must be an object or null.
    #[serde(default)]
    pub conf: Value,
}

impl TriggerRunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_conf(mut self, conf: Value) -> Self {
        self.conf = conf;
        self
    }
}

/// Paging and filter options for `list_runs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRunsRequest {
    pub limit: usize,
    /// Opaque cursor from a previous page.
    pub cursor: Option<String>,
    pub filter: RunFilter,
}

impl ListRunsRequest {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            cursor: None,
            filter: RunFilter::default(),
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_filter(mut self, filter: RunFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Coordinates run records with the execution engine.
///
/// Holds no per-request state. Engine calls are awaited inline and no lock
/// is held across them.
#[derive(Clone)]
pub struct RunOrchestrator {
    repository: Arc<dyn RunRepository>,
    publisher: Arc<dyn StatusPublisher>,
    resolver: Arc<ConfigResolver>,
}

impl RunOrchestrator {
    pub fn new(
        repository: Arc<dyn RunRepository>,
        publisher: Arc<dyn StatusPublisher>,
        resolver: Arc<ConfigResolver>,
    ) -> Self {
        Self {
            repository,
            publisher,
            resolver,
        }
    }

    /// Start a run of a registered workflow.
    ///
    /// The run record is written only after the engine accepted the
    /// trigger, so a failed or timed-out trigger leaves nothing behind.
    pub async fn trigger_run(
        &self,
        ctx: &RequestContext,
        workflow_name: &str,
        request: TriggerRunRequest,
    ) -> Result<WorkflowRun> {
        validate_workflow_name(workflow_name).map_err(OrchestratorError::invalid)?;
        let supplied = request.run_id.is_some();
        let run_id = match request.run_id {
            Some(id) => {
                validate_run_id(&id).map_err(OrchestratorError::invalid)?;
                id
            }
            None => generate_run_id(),
        };
        if !(request.conf.is_object() || request.conf.is_null()) {
            return Err(OrchestratorError::InvalidRequest(
                "conf must be a JSON object".to_string(),
            ));
        }

        let workflow = self.load_workflow(workflow_name).await?;
        let resolved = engine_for(&self.resolver, ctx, &workflow).await?;
        let engine = resolved.engine;

        if supplied {
            if engine.protocol().rejects_duplicate_run_ids() {
                // The engine answers a reused id with a conflict on its own.
                match self.repository.get_run(workflow_name, &run_id).await {
                    Ok(Some(_)) => return Err(duplicate(&run_id)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            workflow = %workflow_name,
                            run_id = %run_id,
                            error = %e,
                            "Duplicate-run lookup failed; relying on engine"
                        );
                    }
                }
            } else if self
                .repository
                .get_run(workflow_name, &run_id)
                .await?
                .is_some()
            {
                return Err(duplicate(&run_id));
            }
        }

        debug!(
            workflow = %workflow_name,
            run_id = %run_id,
            generation = %engine.generation(),
            "Triggering run"
        );
        let outcome = engine
            .trigger(workflow_name, &run_id, &request.conf, &ctx.correlation_id)
            .await?;
        if outcome.run_id != run_id {
            debug!(
                run_id = %run_id,
                engine_run_id = %outcome.run_id,
                "Engine recorded a different run id"
            );
        }

        let run = WorkflowRun::submitted(
            &workflow,
            run_id,
            outcome.correlation_token,
            ctx.user.clone(),
            dagrun_types::now(),
        );
        self.repository.create_run(&run).await?;

        info!(
            workflow = %workflow_name,
            run_id = %run.run_id,
            correlation_token = %run.correlation_token,
            "Run submitted"
        );
        Ok(run)
    }

    /// Fetch a run, merging in the engine's live status while it is in flight.
    ///
    /// Terminal runs are answered from storage. A failed engine resolution or
    /// poll degrades to the stored record. The merge is written only if the
    /// stored status is unchanged since it was read; otherwise the newer
    /// stored record wins.
    pub async fn get_run(
        &self,
        ctx: &RequestContext,
        workflow_name: &str,
        run_id: &str,
    ) -> Result<WorkflowRun> {
        let run = self.load_run(workflow_name, run_id).await?;
        if run.is_terminal() {
            return Ok(run);
        }

        let workflow = self.repository.get_workflow_metadata(workflow_name).await?;
        let resolved = match &workflow {
            Some(wf) => engine_for(&self.resolver, ctx, wf).await,
            None => self
                .resolver
                .resolve_config(&ctx.partition_id)
                .await
                .map_err(OrchestratorError::from),
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(
                    workflow = %workflow_name,
                    run_id = %run_id,
                    partition = %ctx.partition_id,
                    error = %e,
                    "Engine resolution failed; returning stored run"
                );
                return Ok(run);
            }
        };

        let live = match resolved.engine.fetch_status(&run).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    workflow = %workflow_name,
                    run_id = %run_id,
                    error = %e,
                    "Status poll failed; returning stored run"
                );
                return Ok(run);
            }
        };

        if live == run.status {
            return Ok(run);
        }

        let mut merged = run.clone();
        let transition = match merged.apply_status(live, dagrun_types::now()) {
            Ok(transition) => transition,
            Err(e) => {
                debug!(run_id = %run_id, live = %live, reason = %e, "Live status not applied");
                return Ok(run);
            }
        };

        if !self.repository.update_run_if(&merged, run.status).await? {
            debug!(
                run_id = %run_id,
                live = %live,
                "Run changed during poll; keeping stored record"
            );
            return self.load_run(workflow_name, run_id).await;
        }

        debug!(
            run_id = %run_id,
            from = %transition.from,
            to = %transition.to,
            "Merged live status"
        );
        Ok(merged)
    }

    /// List one page of a workflow's runs.
    ///
    /// A cursor is returned only when the page is full and more runs may
    /// follow.
    pub async fn list_runs(
        &self,
        workflow_name: &str,
        request: ListRunsRequest,
    ) -> Result<RunPage> {
        let limit = request.limit;
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        validate_workflow_name(workflow_name).map_err(OrchestratorError::invalid)?;
        let mut token = match request.cursor.as_deref() {
            Some(c) => Some(cursor::decode(Some(c))?),
            None => None,
        };

        let filter = request.filter;
        let items = if filter.is_empty() || self.repository.supports_filter_pushdown() {
            let page = self
                .repository
                .list_runs(workflow_name, limit, token.as_deref(), &filter)
                .await?;
            token = page.next_cursor;
            page.items
        } else {
            // Filter locally, pulling further pages until this one is full.
            let unfiltered = RunFilter::default();
            let mut items = Vec::with_capacity(limit);
            loop {
                let page = self
                    .repository
                    .list_runs(
                        workflow_name,
                        limit - items.len(),
                        token.as_deref(),
                        &unfiltered,
                    )
                    .await?;
                items.extend(page.items.into_iter().filter(|r| filter.matches(r)));
                token = page.next_cursor;
                if items.len() >= limit || token.is_none() {
                    break items;
                }
            }
        };

        let next_cursor = match token {
            Some(t) if items.len() == limit => Some(cursor::encode(Some(&t))?),
            _ => None,
        };

        debug!(
            workflow = %workflow_name,
            count = items.len(),
            more = next_cursor.is_some(),
            "Listed runs"
        );
        Ok(RunPage { items, next_cursor })
    }

    /// Move a run to a new status and announce it.
    ///
    /// Publishing is best effort: a failed publish is logged and the update
    /// still succeeds.
    pub async fn update_run(
        &self,
        ctx: &RequestContext,
        workflow_name: &str,
        run_id: &str,
        status: RunStatus,
    ) -> Result<WorkflowRun> {
        validate_target(status).map_err(|e| OrchestratorError::rejected(run_id, e))?;

        let mut run = self.load_run(workflow_name, run_id).await?;
        let transition = run
            .apply_status(status, dagrun_types::now())
            .map_err(|e| OrchestratorError::rejected(run_id, e))?;
        self.repository.update_run(&run).await?;

        info!(
            workflow = %workflow_name,
            run_id = %run_id,
            from = %transition.from,
            to = %transition.to,
            "Run status updated"
        );

        let event = RunStatusEvent {
            run_id: run.run_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
            status: run.status,
        };
        let attributes = EventAttributes {
            partition_id: ctx.partition_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
        };
        if let Err(e) = self.publisher.publish(&[event], &attributes).await {
            warn!(run_id = %run_id, error = %e, "Failed to publish status event");
        }

        Ok(run)
    }

    /// Delete every run of a workflow. Used only by workflow deletion.
    pub async fn delete_runs_for_workflow(&self, workflow_name: &str) -> Result<usize> {
        let run_ids: Vec<String> = self
            .all_runs(workflow_name)
            .await?
            .into_iter()
            .map(|r| r.run_id)
            .collect();
        if !run_ids.is_empty() {
            self.repository.delete_runs(workflow_name, &run_ids).await?;
        }
        info!(workflow = %workflow_name, count = run_ids.len(), "Deleted workflow runs");
        Ok(run_ids.len())
    }

    /// Every stored run of a workflow, following backend pages to the end.
    pub(crate) async fn all_runs(&self, workflow_name: &str) -> Result<Vec<WorkflowRun>> {
        let filter = RunFilter::default();
        let mut runs = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .repository
                .list_runs(workflow_name, SWEEP_PAGE_SIZE, token.as_deref(), &filter)
                .await?;
            runs.extend(page.items);
            match page.next_cursor {
                Some(next) => token = Some(next),
                None => return Ok(runs),
            }
        }
    }

    async fn load_workflow(&self, workflow_name: &str) -> Result<Workflow> {
        self.repository
            .get_workflow_metadata(workflow_name)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("workflow '{}'", workflow_name)))
    }

    async fn load_run(&self, workflow_name: &str, run_id: &str) -> Result<WorkflowRun> {
        self.repository
            .get_run(workflow_name, run_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!(
                    "run '{}' of workflow '{}'",
                    run_id, workflow_name
                ))
            })
    }
}

fn duplicate(run_id: &str) -> OrchestratorError {
    OrchestratorError::conflict(run_id, format!("run '{}' already exists", run_id))
}
