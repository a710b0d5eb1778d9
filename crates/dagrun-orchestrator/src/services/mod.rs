//! Orchestrator services.
//!
//! [`RunOrchestrator`](runs::RunOrchestrator) drives run lifecycles and
//! [`WorkflowService`](workflows::WorkflowService) manages the workflows they
//! belong to. [`Services`] wires both onto one set of collaborators.

pub mod runs;
pub mod workflows;

use std::sync::Arc;

use dagrun_config::{ConfigResolver, ResolvedEngine};
use dagrun_types::{RequestContext, Workflow};
use tracing::info;

use crate::error::Result;
use crate::publisher::StatusPublisher;
use crate::store::{DefinitionStore, RunRepository};

/// Pick the engine a workflow runs on.
///
/// System workflows go to the system engine; everything else to the
/// caller's tenant engine.
pub(crate) async fn engine_for(
    resolver: &ConfigResolver,
    ctx: &RequestContext,
    workflow: &Workflow,
) -> Result<ResolvedEngine> {
    if workflow.is_system_workflow {
        Ok(resolver.resolve_system_config())
    } else {
        Ok(resolver.resolve_config(&ctx.partition_id).await?)
    }
}

/// Orchestrator services facade.
#[derive(Clone)]
pub struct Services {
    runs: runs::RunOrchestrator,
    workflows: workflows::WorkflowService,
}

impl Services {
    pub fn new(
        repository: Arc<dyn RunRepository>,
        publisher: Arc<dyn StatusPublisher>,
        definitions: Arc<dyn DefinitionStore>,
        resolver: Arc<ConfigResolver>,
    ) -> Self {
        info!("Initializing orchestrator services");

        let runs = runs::RunOrchestrator::new(repository.clone(), publisher, resolver.clone());
        let workflows =
            workflows::WorkflowService::new(repository, definitions, resolver, runs.clone());

        Self { runs, workflows }
    }

    pub fn runs(&self) -> &runs::RunOrchestrator {
        &self.runs
    }

    pub fn workflows(&self) -> &workflows::WorkflowService {
        &self.workflows
    }
}
