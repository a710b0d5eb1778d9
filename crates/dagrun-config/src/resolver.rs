//! Engine resolution: tenant id → ready engine handle.
//!
//! Tenants whose partition has the engine disabled share one default
//! engine; enabled tenants get an engine built from their partition values.
//! Either way the result is cached per tenant, and the cache is consulted
//! before the partition provider. System workflows resolve through a
//! separate path that is never keyed by tenant.

use std::sync::Arc;
use std::time::Duration;

use dagrun_engine::{Credentials, EngineGeneration, HttpEngine, SharedEngine};
use tracing::{debug, info};

use crate::cache::ConfigCache;
use crate::error::{ConfigError, Result};
use crate::provider::PartitionProvider;
use crate::types::{EngineSection, ServiceConfig};

/// Concrete engine settings after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub generation: EngineGeneration,
    pub timeout: Duration,
}

impl EngineConfig {
    fn from_section(section: &EngineSection, name: &str) -> Result<Self> {
        Ok(Self {
            base_url: section.require_base_url(name)?.to_string(),
            credentials: section.credentials.clone(),
            generation: section.generation,
            timeout: section.timeout(),
        })
    }
}

/// Resolved settings plus the engine built from them.
#[derive(Clone)]
pub struct ResolvedEngine {
    pub config: Arc<EngineConfig>,
    pub engine: SharedEngine,
}

impl std::fmt::Debug for ResolvedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builds engine handles from resolved settings.
pub trait EngineFactory: Send + Sync {
    fn build(&self, config: &EngineConfig) -> Result<SharedEngine>;
}

/// Factory producing [`HttpEngine`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpEngineFactory;

impl EngineFactory for HttpEngineFactory {
    fn build(&self, config: &EngineConfig) -> Result<SharedEngine> {
        let engine = HttpEngine::builder()
            .base_url(config.base_url.clone())
            .generation(config.generation)
            .credentials(config.credentials.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Arc::new(engine))
    }
}

/// Resolves engine configuration per tenant.
pub struct ConfigResolver {
    provider: Arc<dyn PartitionProvider>,
    factory: Arc<dyn EngineFactory>,
    cache: ConfigCache<ResolvedEngine>,
    shared: ResolvedEngine,
    system: ResolvedEngine,
    default_generation: EngineGeneration,
    default_timeout: Duration,
}

impl ConfigResolver {
    /// Create a resolver producing HTTP engines.
    pub fn new(
        config: &ServiceConfig,
        provider: Arc<dyn PartitionProvider>,
        cache: ConfigCache<ResolvedEngine>,
    ) -> Result<Self> {
        Self::with_factory(config, provider, cache, Arc::new(HttpEngineFactory))
    }

    /// Create a resolver with a custom engine factory.
    ///
    /// The shared and system engines are built here, once.
    pub fn with_factory(
        config: &ServiceConfig,
        provider: Arc<dyn PartitionProvider>,
        cache: ConfigCache<ResolvedEngine>,
        factory: Arc<dyn EngineFactory>,
    ) -> Result<Self> {
        let shared = build(
            factory.as_ref(),
            EngineConfig::from_section(&config.engine, "engine")?,
        )?;
        let system_name = if config.system_engine.is_some() {
            "system_engine"
        } else {
            "engine"
        };
        let system = build(
            factory.as_ref(),
            EngineConfig::from_section(config.system_engine(), system_name)?,
        )?;

        info!(
            shared = %shared.config.base_url,
            system = %system.config.base_url,
            generation = %shared.config.generation,
            "Engine resolver ready"
        );

        Ok(Self {
            provider,
            factory,
            cache,
            shared,
            system,
            default_generation: config.engine.generation,
            default_timeout: config.engine.timeout(),
        })
    }

    /// The cache handle this resolver fills.
    pub fn cache(&self) -> &ConfigCache<ResolvedEngine> {
        &self.cache
    }

    /// Resolve the engine for a tenant.
    pub async fn resolve_config(&self, tenant_id: &str) -> Result<ResolvedEngine> {
        if let Some(hit) = self.cache.get(tenant_id) {
            return Ok(hit);
        }

        let partition = self.provider.get_partition_info(tenant_id).await?;

        let resolved = if partition.engine_enabled {
            let base_url = partition
                .endpoint
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    field: "endpoint".to_string(),
                    context: format!("partition '{}'", tenant_id),
                })?;
            let config = EngineConfig {
                base_url,
                credentials: partition.credentials(),
                generation: partition.generation.unwrap_or(self.default_generation),
                timeout: self.default_timeout,
            };
            debug!(
                tenant = %tenant_id,
                base_url = %config.base_url,
                generation = %config.generation,
                "Resolved tenant engine"
            );
            build(self.factory.as_ref(), config)?
        } else {
            debug!(tenant = %tenant_id, "Tenant uses shared engine");
            self.shared.clone()
        };

        self.cache.put(tenant_id, resolved.clone());
        Ok(resolved)
    }

    /// Resolve the engine for system workflows.
    pub fn resolve_system_config(&self) -> ResolvedEngine {
        self.system.clone()
    }
}

fn build(factory: &dyn EngineFactory, config: EngineConfig) -> Result<ResolvedEngine> {
    let engine = factory.build(&config)?;
    Ok(ResolvedEngine {
        config: Arc::new(config),
        engine,
    })
}
