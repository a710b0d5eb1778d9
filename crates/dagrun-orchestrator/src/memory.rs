//! In-memory collaborators.
//!
//! Reference implementations of the storage, publishing and engine seams,
//! used by tests and local wiring. Each can be switched into a failing mode
//! to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dagrun_engine::{
    engine_conf, EngineError, EngineGeneration, ExecutionEngine, TriggerOutcome, WireProtocol,
};
use dagrun_types::{RunStatus, Workflow, WorkflowRun};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::publisher::{self, EventAttributes, PublishError, RunStatusEvent, StatusPublisher};
use crate::store::{self, DefinitionStore, RunFilter, RunPage, RunRepository, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Repository
// ─────────────────────────────────────────────────────────────────────────────

/// Native page token of [`InMemoryRepository`].
#[derive(Debug, Serialize, Deserialize)]
struct OffsetToken {
    offset: usize,
}

#[derive(Debug, Default)]
struct RepoState {
    workflows: BTreeMap<String, Workflow>,
    /// Runs per workflow in insertion order.
    runs: HashMap<String, Vec<WorkflowRun>>,
}

/// Repository holding everything in process memory.
///
/// Pages are offsets into the insertion-ordered run list, handed out as
/// JSON tokens such as `{"offset":2}`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<RepoState>,
    filter_pushdown: bool,
    fail_reads: AtomicBool,
    list_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply [`RunFilter`]s inside `list_runs`.
    pub fn with_filter_pushdown(mut self, enabled: bool) -> Self {
        self.filter_pushdown = enabled;
        self
    }

    /// Make run reads fail with a backend error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_runs` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a workflow's runs.
    pub fn runs(&self, workflow_name: &str) -> Vec<WorkflowRun> {
        self.state
            .read()
            .runs
            .get(workflow_name)
            .cloned()
            .unwrap_or_default()
    }

    fn check_reads(&self) -> store::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("run reads unavailable".to_string()));
        }
        Ok(())
    }
}

fn parse_token(token: Option<&str>) -> store::Result<usize> {
    match token {
        None => Ok(0),
        Some(raw) => serde_json::from_str::<OffsetToken>(raw)
            .map(|t| t.offset)
            .map_err(|e| StoreError::InvalidToken(e.to_string())),
    }
}

#[async_trait]
impl RunRepository for InMemoryRepository {
    async fn create_run(&self, run: &WorkflowRun) -> store::Result<()> {
        let mut state = self.state.write();
        let runs = state.runs.entry(run.workflow_name.clone()).or_default();
        if runs.iter().any(|r| r.run_id == run.run_id) {
            return Err(StoreError::AlreadyExists(run.run_id.clone()));
        }
        runs.push(run.clone());
        Ok(())
    }

    async fn get_run(
        &self,
        workflow_name: &str,
        run_id: &str,
    ) -> store::Result<Option<WorkflowRun>> {
        self.check_reads()?;
        Ok(self
            .state
            .read()
            .runs
            .get(workflow_name)
            .and_then(|runs| runs.iter().find(|r| r.run_id == run_id))
            .cloned())
    }

    async fn list_runs(
        &self,
        workflow_name: &str,
        limit: usize,
        page_token: Option<&str>,
        filter: &RunFilter,
    ) -> store::Result<RunPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let offset = parse_token(page_token)?;

        let state = self.state.read();
        let candidates: Vec<&WorkflowRun> = state
            .runs
            .get(workflow_name)
            .map(|runs| {
                runs.iter()
                    .filter(|r| !self.filter_pushdown || filter.matches(r))
                    .collect()
            })
            .unwrap_or_default();

        let items: Vec<WorkflowRun> = candidates
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| (*r).clone())
            .collect();

        let end = offset + items.len();
        let next_cursor = if end < candidates.len() {
            let token = serde_json::to_string(&OffsetToken { offset: end })
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Some(token)
        } else {
            None
        };

        Ok(RunPage { items, next_cursor })
    }

    async fn update_run(&self, run: &WorkflowRun) -> store::Result<()> {
        let mut state = self.state.write();
        let stored = state
            .runs
            .get_mut(&run.workflow_name)
            .and_then(|runs| runs.iter_mut().find(|r| r.run_id == run.run_id))
            .ok_or_else(|| StoreError::NotFound(format!("run '{}'", run.run_id)))?;
        *stored = run.clone();
        Ok(())
    }

    async fn update_run_if(
        &self,
        run: &WorkflowRun,
        expected: RunStatus,
    ) -> store::Result<bool> {
        let mut state = self.state.write();
        let stored = state
            .runs
            .get_mut(&run.workflow_name)
            .and_then(|runs| runs.iter_mut().find(|r| r.run_id == run.run_id))
            .ok_or_else(|| StoreError::NotFound(format!("run '{}'", run.run_id)))?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = run.clone();
        Ok(true)
    }

    async fn delete_runs(&self, workflow_name: &str, run_ids: &[String]) -> store::Result<()> {
        let mut state = self.state.write();
        if let Some(runs) = state.runs.get_mut(workflow_name) {
            runs.retain(|r| !run_ids.contains(&r.run_id));
            if runs.is_empty() {
                state.runs.remove(workflow_name);
            }
        }
        Ok(())
    }

    async fn create_workflow_metadata(&self, workflow: &Workflow) -> store::Result<()> {
        let mut state = self.state.write();
        if state.workflows.contains_key(&workflow.workflow_name) {
            return Err(StoreError::AlreadyExists(workflow.workflow_name.clone()));
        }
        state
            .workflows
            .insert(workflow.workflow_name.clone(), workflow.clone());
        Ok(())
    }

    async fn get_workflow_metadata(&self, workflow_name: &str) -> store::Result<Option<Workflow>> {
        Ok(self.state.read().workflows.get(workflow_name).cloned())
    }

    async fn delete_workflow_metadata(&self, workflow_name: &str) -> store::Result<()> {
        self.state.write().workflows.remove(workflow_name);
        Ok(())
    }

    async fn list_workflow_metadata(&self, prefix: &str) -> store::Result<Vec<Workflow>> {
        Ok(self
            .state
            .read()
            .workflows
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(_, wf)| wf.clone())
            .collect())
    }

    fn supports_filter_pushdown(&self) -> bool {
        self.filter_pushdown
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Definition store
// ─────────────────────────────────────────────────────────────────────────────

/// Definition files kept in a map.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    files: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_name: &str) -> Option<String> {
        self.files.read().get(file_name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn save(&self, file_name: &str, content: &str) -> store::Result<()> {
        self.files
            .write()
            .insert(file_name.to_string(), content.to_string());
        Ok(())
    }

    async fn delete(&self, file_name: &str) -> store::Result<()> {
        self.files.write().remove(file_name);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Publisher
// ─────────────────────────────────────────────────────────────────────────────

/// A published batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedBatch {
    pub events: Vec<RunStatusEvent>,
    pub attributes: EventAttributes,
}

/// Publisher that validates and records batches.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    batches: Mutex<Vec<PublishedBatch>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<PublishedBatch> {
        self.batches.lock().clone()
    }

    /// All events across batches, in publish order.
    pub fn events(&self) -> Vec<RunStatusEvent> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(
        &self,
        events: &[RunStatusEvent],
        attributes: &EventAttributes,
    ) -> publisher::Result<()> {
        if events.is_empty() {
            return Err(PublishError::EmptyBatch);
        }
        attributes.validate()?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Transport("event bus unavailable".to_string()));
        }
        self.batches.lock().push(PublishedBatch {
            events: events.to_vec(),
            attributes: attributes.clone(),
        });
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// A trigger the mock engine accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCall {
    pub workflow_name: String,
    pub run_id: String,
    pub path: String,
    pub body: Value,
    pub correlation_id: String,
}

#[derive(Debug, Default)]
struct MockEngineState {
    triggers: Vec<TriggerCall>,
    /// (workflow, run id) pairs the engine knows.
    known: HashSet<(String, String)>,
    /// Correlation token by run id.
    tokens: HashMap<String, String>,
    /// Live status by correlation token.
    statuses: HashMap<String, RunStatus>,
    polls: usize,
}

/// Engine double speaking a real wire protocol without a network.
///
/// Trigger requests are built and answered through the generation's
/// [`WireProtocol`], so correlation tokens look exactly like a real
/// engine's. A stable engine rejects reused run ids with a conflict; an
/// experimental one accepts them.
#[derive(Debug)]
pub struct MockEngine {
    protocol: Arc<dyn WireProtocol>,
    state: Mutex<MockEngineState>,
    unreachable: AtomicBool,
}

impl MockEngine {
    pub fn new(generation: EngineGeneration) -> Self {
        Self {
            protocol: generation.protocol(),
            state: Mutex::new(MockEngineState::default()),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails as unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Set the live status the engine reports for a triggered run.
    pub fn set_run_status(&self, run_id: &str, status: RunStatus) {
        let mut state = self.state.lock();
        if let Some(token) = state.tokens.get(run_id).cloned() {
            state.statuses.insert(token, status);
        }
    }

    pub fn triggers(&self) -> Vec<TriggerCall> {
        self.state.lock().triggers.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.state.lock().polls
    }

    fn check_reachable(&self) -> dagrun_engine::Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unreachable(
                "connection refused (mock outage)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    fn protocol(&self) -> &dyn WireProtocol {
        self.protocol.as_ref()
    }

    async fn trigger(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
        correlation_id: &str,
    ) -> dagrun_engine::Result<TriggerOutcome> {
        self.check_reachable()?;

        let key = (workflow_name.to_string(), run_id.to_string());
        let mut state = self.state.lock();
        if self.protocol.rejects_duplicate_run_ids() && state.known.contains(&key) {
            return Err(EngineError::Conflict {
                run_id: run_id.to_string(),
            });
        }

        let request = self.protocol.build_trigger_request(
            workflow_name,
            run_id,
            &engine_conf(conf, run_id, correlation_id),
        );
        // The request body carries every field a trigger answer needs.
        let outcome = self.protocol.parse_trigger_response(&request.body)?;

        state.known.insert(key);
        state
            .tokens
            .insert(run_id.to_string(), outcome.correlation_token.clone());
        state
            .statuses
            .insert(outcome.correlation_token.clone(), RunStatus::Queued);
        state.triggers.push(TriggerCall {
            workflow_name: workflow_name.to_string(),
            run_id: run_id.to_string(),
            path: request.path,
            body: request.body,
            correlation_id: correlation_id.to_string(),
        });
        Ok(outcome)
    }

    async fn fetch_status(&self, run: &WorkflowRun) -> dagrun_engine::Result<RunStatus> {
        self.check_reachable()?;
        let key = self.protocol.status_query_key(run);
        let mut state = self.state.lock();
        state.polls += 1;
        state
            .statuses
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("dag run '{}'", key)))
    }
}
