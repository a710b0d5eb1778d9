//! Workflow-run orchestration for dagrun.
//!
//! This crate sits between a transport layer and the external execution
//! engine. It validates requests, triggers runs on the engine the caller's
//! tenant resolves to, reconciles live engine status with the persisted run
//! record, and announces status changes.
//!
//! - **Runs**: [`RunOrchestrator`] triggers, polls, lists and updates runs
//! - **Workflows**: [`WorkflowService`] registers and deletes workflows
//! - **Collaborators**: [`RunRepository`], [`StatusPublisher`] and
//!   [`DefinitionStore`] are traits; [`memory`] has in-process versions
//!
//! # Example
//!
//! ```ignore
//! use dagrun_orchestrator::{Services, TriggerRunRequest};
//!
//! let services = Services::new(repository, publisher, definitions, resolver);
//!
//! let run = services
//!     .runs()
//!     .trigger_run(&ctx, "csv_ingest", TriggerRunRequest::new().with_run_id("r1"))
//!     .await?;
//! ```

pub mod cursor;
mod error;
pub mod memory;
pub mod publisher;
pub mod services;
pub mod store;

pub use cursor::CursorError;
pub use error::{OrchestratorError, Result};
pub use memory::{
    InMemoryDefinitionStore, InMemoryRepository, MockEngine, PublishedBatch, RecordingPublisher,
    TriggerCall,
};
pub use publisher::{EventAttributes, PublishError, RunStatusEvent, StatusPublisher};
pub use services::runs::{ListRunsRequest, RunOrchestrator, TriggerRunRequest, MAX_PAGE_SIZE};
pub use services::workflows::{CreateWorkflowRequest, WorkflowService};
pub use services::Services;
pub use store::{DefinitionStore, RunFilter, RunPage, RunRepository, StoreError};

// Re-export key types from the lower layers for convenience
pub use dagrun_config::{ConfigResolver, ServiceConfig};
pub use dagrun_types::{RequestContext, RunStatus, Workflow, WorkflowRun};
