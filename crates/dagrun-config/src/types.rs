//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [engine]                  # shared default engine
//! base_url = "http://airflow:8080"
//! generation = "stable"
//! timeout_secs = 30
//!
//! [engine.credentials]
//! type = "basic"
//! username = "svc"
//! password = "..."
//!
//! [system_engine]           # engine for system workflows (optional)
//! base_url = "http://airflow-system:8080"
//!
//! [cache]
//! ttl_secs = 3600
//! capacity = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use dagrun_engine::{Credentials, EngineGeneration};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::error::{ConfigError, Result};

/// Default engine request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Shared default engine, used for tenants without their own engine.
    pub engine: EngineSection,

    /// Engine for system workflows. Falls back to `engine` when absent.
    pub system_engine: Option<EngineSection>,

    /// Tenant config cache policy.
    pub cache: CacheSection,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// The engine section system workflows resolve to.
    pub fn system_engine(&self) -> &EngineSection {
        self.system_engine.as_ref().unwrap_or(&self.engine)
    }
}

/// `[engine]` / `[system_engine]` sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Engine base URL. Required before an engine can be built.
    pub base_url: Option<String>,

    /// Wire-protocol generation.
    pub generation: EngineGeneration,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Credentials sent with every engine request.
    pub credentials: Credentials,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            base_url: None,
            generation: EngineGeneration::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            credentials: Credentials::None,
        }
    }
}

impl EngineSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The base URL, or a missing-field error naming the section.
    pub fn require_base_url(&self, section: &str) -> Result<&str> {
        self.base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "base_url".to_string(),
                context: format!("[{}]", section),
            })
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_capacity(self.capacity)
    }
}

/// Load config from a specific file path.
pub fn load_config_file(path: &Path) -> Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ServiceConfig::from_toml(&contents)
}
