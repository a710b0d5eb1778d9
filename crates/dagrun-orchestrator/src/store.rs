//! Persistence collaborators.
//!
//! The orchestrator owns no storage. Run records and workflow metadata live
//! behind [`RunRepository`]; service-deployed engine definition files live
//! behind [`DefinitionStore`].

use async_trait::async_trait;
use dagrun_types::{RunStatus, Timestamp, Workflow, WorkflowRun};
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The native page token was not produced by this backend.
    #[error("Invalid page token: {0}")]
    InvalidToken(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Optional run-list filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    /// Keep runs whose id starts with this prefix.
    pub run_id_prefix: Option<String>,
    /// Keep runs started strictly after this instant.
    pub start_after: Option<Timestamp>,
    /// Keep runs that ended strictly before this instant. Runs still in
    /// flight have no end and never match.
    pub end_before: Option<Timestamp>,
}

impl RunFilter {
    pub fn is_empty(&self) -> bool {
        self.run_id_prefix.is_none() && self.start_after.is_none() && self.end_before.is_none()
    }

    pub fn with_run_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_id_prefix = Some(prefix.into());
        self
    }

    pub fn with_start_after(mut self, at: Timestamp) -> Self {
        self.start_after = Some(at);
        self
    }

    pub fn with_end_before(mut self, at: Timestamp) -> Self {
        self.end_before = Some(at);
        self
    }

    pub fn matches(&self, run: &WorkflowRun) -> bool {
        if let Some(prefix) = &self.run_id_prefix {
            if !run.run_id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.start_after {
            if run.start_time_stamp <= after {
                return false;
            }
        }
        if let Some(before) = self.end_before {
            match run.end_time_stamp {
                Some(end) if end < before => {}
                _ => return false,
            }
        }
        true
    }
}

/// One page of runs.
///
/// Coming out of a repository `next_cursor` is the backend's native token;
/// coming out of the orchestrator it is an opaque cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPage {
    pub items: Vec<WorkflowRun>,
    pub next_cursor: Option<String>,
}

/// Storage for run records and workflow metadata.
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create_run(&self, run: &WorkflowRun) -> Result<()>;

    async fn get_run(&self, workflow_name: &str, run_id: &str) -> Result<Option<WorkflowRun>>;

    /// List up to `limit` runs of a workflow, oldest first.
    ///
    /// `page_token` is a token previously returned in
    /// [`RunPage::next_cursor`]. Backends without filter pushdown may ignore
    /// `filter`.
    async fn list_runs(
        &self,
        workflow_name: &str,
        limit: usize,
        page_token: Option<&str>,
        filter: &RunFilter,
    ) -> Result<RunPage>;

    /// Replace a stored run.
    async fn update_run(&self, run: &WorkflowRun) -> Result<()>;

    /// Replace a stored run only while its stored status is still
    /// `expected`. Returns whether the write happened.
    ///
    /// The check and the write must be atomic.
    async fn update_run_if(&self, run: &WorkflowRun, expected: RunStatus) -> Result<bool>;

    /// Delete the named runs of a workflow. Unknown ids are ignored.
    async fn delete_runs(&self, workflow_name: &str, run_ids: &[String]) -> Result<()>;

    async fn create_workflow_metadata(&self, workflow: &Workflow) -> Result<()>;

    async fn get_workflow_metadata(&self, workflow_name: &str) -> Result<Option<Workflow>>;

    async fn delete_workflow_metadata(&self, workflow_name: &str) -> Result<()>;

    /// Workflows whose name starts with `prefix`.
    async fn list_workflow_metadata(&self, prefix: &str) -> Result<Vec<Workflow>>;

    /// Whether `list_runs` applies [`RunFilter`] itself.
    fn supports_filter_pushdown(&self) -> bool {
        false
    }
}

/// The engine's definition file share.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Write (or overwrite) a definition file.
    async fn save(&self, file_name: &str, content: &str) -> Result<()>;

    /// Remove a definition file. Missing files are not an error.
    async fn delete(&self, file_name: &str) -> Result<()>;
}
