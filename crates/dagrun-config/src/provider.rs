//! Per-tenant settings collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dagrun_engine::{Credentials, EngineGeneration};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Credential field holding a bearer token.
pub const TOKEN_FIELD: &str = "token";
/// Credential field holding a basic-auth user name.
pub const USERNAME_FIELD: &str = "username";
/// Credential field holding a basic-auth password.
pub const PASSWORD_FIELD: &str = "password";

/// Engine settings a tenant's partition carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    /// Whether the tenant runs its own engine.
    pub engine_enabled: bool,
    /// Tenant engine base URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Raw credential fields (`token`, or `username` + `password`).
    #[serde(default)]
    pub credential_fields: HashMap<String, String>,
    /// Wire generation override for the tenant engine.
    #[serde(default)]
    pub generation: Option<EngineGeneration>,
}

impl PartitionInfo {
    /// A tenant on the shared engine.
    pub fn shared() -> Self {
        Self::default()
    }

    /// A tenant with its own engine at `endpoint`.
    pub fn dedicated(endpoint: impl Into<String>) -> Self {
        Self {
            engine_enabled: true,
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credential_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_generation(mut self, generation: EngineGeneration) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Interpret the credential fields.
    ///
    /// A token wins over a user/password pair; neither means no credentials.
    pub fn credentials(&self) -> Credentials {
        let field = |k: &str| {
            self.credential_fields
                .get(k)
                .filter(|v| !v.is_empty())
                .cloned()
        };

        if let Some(token) = field(TOKEN_FIELD) {
            return Credentials::Bearer { token };
        }
        match (field(USERNAME_FIELD), field(PASSWORD_FIELD)) {
            (Some(username), Some(password)) => Credentials::Basic { username, password },
            _ => Credentials::None,
        }
    }
}

/// Source of per-tenant partition settings.
#[async_trait]
pub trait PartitionProvider: Send + Sync {
    async fn get_partition_info(&self, tenant_id: &str) -> Result<PartitionInfo>;
}

/// In-memory provider backed by a fixed tenant table.
///
/// Counts lookups so callers can observe cache behaviour.
#[derive(Debug, Default)]
pub struct StaticPartitionProvider {
    partitions: RwLock<HashMap<String, PartitionInfo>>,
    calls: AtomicUsize,
}

impl StaticPartitionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(self, tenant_id: impl Into<String>, info: PartitionInfo) -> Self {
        self.insert(tenant_id, info);
        self
    }

    pub fn insert(&self, tenant_id: impl Into<String>, info: PartitionInfo) {
        self.partitions.write().insert(tenant_id.into(), info);
    }

    /// Number of lookups served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartitionProvider for StaticPartitionProvider {
    async fn get_partition_info(&self, tenant_id: &str) -> Result<PartitionInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.partitions
            .read()
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| ConfigError::Provider {
                tenant: tenant_id.to_string(),
                message: "unknown partition".to_string(),
            })
    }
}
