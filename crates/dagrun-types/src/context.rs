//! Caller context carried through every orchestrator operation.

use serde::{Deserialize, Serialize};

/// Identity and trace information for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Tenant the request belongs to.
    pub partition_id: String,
    /// Trace id forwarded to the engine and the event publisher.
    pub correlation_id: String,
    /// Authenticated caller, recorded as creator/submitter.
    pub user: String,
}

impl RequestContext {
    pub fn new(
        partition_id: impl Into<String>,
        correlation_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            correlation_id: correlation_id.into(),
            user: user.into(),
        }
    }
}
