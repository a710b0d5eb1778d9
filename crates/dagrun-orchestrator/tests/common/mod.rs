//! Shared wiring for orchestrator integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use dagrun_config::{
    ConfigCache, ConfigResolver, EngineConfig, EngineFactory, PartitionInfo, ServiceConfig,
    StaticPartitionProvider,
};
use dagrun_engine::{
    EngineGeneration, ExecutionEngine, SharedEngine, TriggerOutcome, WireProtocol,
};
use dagrun_orchestrator::{
    CreateWorkflowRequest, InMemoryDefinitionStore, InMemoryRepository, MockEngine,
    RecordingPublisher, RequestContext, RunStatus, Services, Workflow, WorkflowRun,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

pub const SHARED_URL: &str = "http://shared.test";
pub const SYSTEM_URL: &str = "http://system.test";
pub const TENANT_B_URL: &str = "http://tenant-b.test";

/// Holds the next status poll until released.
#[derive(Default)]
pub struct PollGate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl PollGate {
    /// Park the next poll on any engine.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a poll is parked.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the parked poll reach the engine.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

/// [`MockEngine`] whose polls pass through a [`PollGate`].
struct GatedEngine {
    inner: Arc<MockEngine>,
    gate: Arc<PollGate>,
}

#[async_trait]
impl ExecutionEngine for GatedEngine {
    fn protocol(&self) -> &dyn WireProtocol {
        self.inner.protocol()
    }

    async fn trigger(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
        correlation_id: &str,
    ) -> dagrun_engine::Result<TriggerOutcome> {
        self.inner
            .trigger(workflow_name, run_id, conf, correlation_id)
            .await
    }

    async fn fetch_status(&self, run: &WorkflowRun) -> dagrun_engine::Result<RunStatus> {
        self.gate.pass().await;
        self.inner.fetch_status(run).await
    }
}

/// Hands out one [`MockEngine`] per base URL.
#[derive(Default)]
pub struct MockEngineFactory {
    engines: Mutex<HashMap<String, Arc<MockEngine>>>,
    gate: Arc<PollGate>,
}

impl MockEngineFactory {
    pub fn engine(&self, base_url: &str) -> Arc<MockEngine> {
        self.engines
            .lock()
            .get(base_url)
            .cloned()
            .unwrap_or_else(|| panic!("no engine built for {}", base_url))
    }
}

impl EngineFactory for MockEngineFactory {
    fn build(&self, config: &EngineConfig) -> dagrun_config::Result<SharedEngine> {
        let engine = self
            .engines
            .lock()
            .entry(config.base_url.clone())
            .or_insert_with(|| Arc::new(MockEngine::new(config.generation)))
            .clone();
        let shared: SharedEngine = Arc::new(GatedEngine {
            inner: engine,
            gate: self.gate.clone(),
        });
        Ok(shared)
    }
}

pub struct Harness {
    pub services: Services,
    pub repo: Arc<InMemoryRepository>,
    pub publisher: Arc<RecordingPublisher>,
    pub definitions: Arc<InMemoryDefinitionStore>,
    pub provider: Arc<StaticPartitionProvider>,
    factory: Arc<MockEngineFactory>,
}

impl Harness {
    /// Tenants resolve to a shared engine of `generation`.
    pub fn new(generation: EngineGeneration) -> Self {
        Self::with_repo(generation, InMemoryRepository::new())
    }

    pub fn with_repo(generation: EngineGeneration, repo: InMemoryRepository) -> Self {
        let config = ServiceConfig::from_toml(&format!(
            r#"
[engine]
base_url = "{SHARED_URL}"
generation = "{generation}"

[system_engine]
base_url = "{SYSTEM_URL}"
generation = "stable"
"#
        ))
        .unwrap();

        let provider = Arc::new(
            StaticPartitionProvider::new()
                .with_partition("tenant-a", PartitionInfo::shared())
                .with_partition(
                    "tenant-b",
                    PartitionInfo::dedicated(TENANT_B_URL)
                        .with_generation(EngineGeneration::Experimental),
                ),
        );
        let factory = Arc::new(MockEngineFactory::default());
        let resolver = ConfigResolver::with_factory(
            &config,
            provider.clone(),
            ConfigCache::new(config.cache.to_cache_config()),
            factory.clone(),
        )
        .unwrap();

        let repo = Arc::new(repo);
        let publisher = Arc::new(RecordingPublisher::new());
        let definitions = Arc::new(InMemoryDefinitionStore::new());
        let services = Services::new(
            repo.clone(),
            publisher.clone(),
            definitions.clone(),
            Arc::new(resolver),
        );

        Self {
            services,
            repo,
            publisher,
            definitions,
            provider,
            factory,
        }
    }

    /// The shared default engine.
    pub fn engine(&self) -> Arc<MockEngine> {
        self.factory.engine(SHARED_URL)
    }

    pub fn system_engine(&self) -> Arc<MockEngine> {
        self.factory.engine(SYSTEM_URL)
    }

    pub fn tenant_engine(&self, base_url: &str) -> Arc<MockEngine> {
        self.factory.engine(base_url)
    }

    pub fn poll_gate(&self) -> &PollGate {
        &self.factory.gate
    }

    pub async fn register(&self, name: &str) -> Workflow {
        self.services
            .workflows()
            .create_workflow(&ctx(), CreateWorkflowRequest::new(name))
            .await
            .unwrap()
    }
}

/// Caller on the shared-engine tenant.
pub fn ctx() -> RequestContext {
    RequestContext::new("tenant-a", "corr-1", "alice@example.com")
}

/// Caller on the tenant with its own engine.
pub fn tenant_b_ctx() -> RequestContext {
    RequestContext::new("tenant-b", "corr-b", "bob@example.com")
}
