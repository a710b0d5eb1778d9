//! Workflow registration: create, inspect, list and delete workflows.

use std::collections::HashMap;
use std::sync::Arc;

use dagrun_config::ConfigResolver;
use dagrun_types::{validate_workflow_name, RequestContext, Workflow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::store::{DefinitionStore, RunRepository};

use super::engine_for;
use super::runs::RunOrchestrator;

/// Body of a workflow registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub workflow_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Engine-specific instructions. `dagContent` holds definition source
    /// to deploy.
    #[serde(default)]
    pub registration_instructions: HashMap<String, String>,
    #[serde(default)]
    pub is_system_workflow: bool,
}

impl CreateWorkflowRequest {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_instruction(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.registration_instructions
            .insert(key.into(), value.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_workflow = true;
        self
    }
}

/// Workflow metadata lifecycle.
#[derive(Clone)]
pub struct WorkflowService {
    repository: Arc<dyn RunRepository>,
    definitions: Arc<dyn DefinitionStore>,
    resolver: Arc<ConfigResolver>,
    runs: RunOrchestrator,
}

impl WorkflowService {
    pub fn new(
        repository: Arc<dyn RunRepository>,
        definitions: Arc<dyn DefinitionStore>,
        resolver: Arc<ConfigResolver>,
        runs: RunOrchestrator,
    ) -> Self {
        Self {
            repository,
            definitions,
            resolver,
            runs,
        }
    }

    /// Register a workflow, deploying its definition when one is supplied.
    pub async fn create_workflow(
        &self,
        ctx: &RequestContext,
        request: CreateWorkflowRequest,
    ) -> Result<Workflow> {
        validate_workflow_name(&request.workflow_name).map_err(OrchestratorError::invalid)?;

        let name = request.workflow_name.as_str();
        if self.repository.get_workflow_metadata(name).await?.is_some() {
            return Err(OrchestratorError::conflict(
                name,
                format!("workflow '{}' already exists", name),
            ));
        }

        let mut workflow = Workflow::new(name, ctx, dagrun_types::now());
        workflow.description = request.description.clone();
        workflow.registration_instructions = request.registration_instructions.clone();
        workflow.is_system_workflow = request.is_system_workflow;

        if let Some(content) = workflow.dag_content() {
            let resolved = engine_for(&self.resolver, ctx, &workflow).await?;
            let file_name = resolved
                .engine
                .protocol()
                .definition_file_name(&workflow.workflow_name);
            self.definitions.save(&file_name, content).await?;
            debug!(workflow = %name, file = %file_name, "Deployed workflow definition");
            workflow.is_deployed_through_service = true;
        }

        self.repository.create_workflow_metadata(&workflow).await?;
        info!(
            workflow = %name,
            version = workflow.version,
            deployed = workflow.is_deployed_through_service,
            "Workflow created"
        );
        Ok(workflow)
    }

    pub async fn get_workflow(&self, workflow_name: &str) -> Result<Workflow> {
        self.repository
            .get_workflow_metadata(workflow_name)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("workflow '{}'", workflow_name)))
    }

    /// Workflows whose name starts with `prefix`.
    pub async fn list_workflows(&self, prefix: &str) -> Result<Vec<Workflow>> {
        Ok(self.repository.list_workflow_metadata(prefix).await?)
    }

    /// Delete a workflow with its runs and deployed definition.
    ///
    /// Deleting a missing workflow is a no-op. A workflow with runs still in
    /// flight cannot be deleted.
    pub async fn delete_workflow(&self, ctx: &RequestContext, workflow_name: &str) -> Result<()> {
        let Some(workflow) = self.repository.get_workflow_metadata(workflow_name).await? else {
            debug!(workflow = %workflow_name, "Workflow already absent");
            return Ok(());
        };

        let active: Vec<String> = self
            .runs
            .all_runs(workflow_name)
            .await?
            .into_iter()
            .filter(|r| !r.is_terminal())
            .map(|r| r.run_id)
            .collect();
        if !active.is_empty() {
            return Err(OrchestratorError::conflict(
                workflow_name,
                format!(
                    "workflow has {} active run(s): {}",
                    active.len(),
                    active.join(", ")
                ),
            ));
        }

        if workflow.is_deployed_through_service {
            let resolved = engine_for(&self.resolver, ctx, &workflow).await?;
            let file_name = resolved
                .engine
                .protocol()
                .definition_file_name(workflow_name);
            self.definitions.delete(&file_name).await?;
            debug!(workflow = %workflow_name, file = %file_name, "Removed workflow definition");
        }

        self.runs.delete_runs_for_workflow(workflow_name).await?;
        self.repository.delete_workflow_metadata(workflow_name).await?;
        info!(workflow = %workflow_name, "Workflow deleted");
        Ok(())
    }
}
