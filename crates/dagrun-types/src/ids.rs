//! Identifier rules for workflow names and run ids.

use crate::error::{Result, ValidationError};

/// Prefix the engine reserves for its own backfill runs.
pub const RESERVED_RUN_PREFIX: &str = "backfill";

/// Maximum length of a workflow name or run id.
pub const MAX_IDENTIFIER_LEN: usize = 64;

fn check(kind: &'static str, value: &str, extra: &[char]) -> Result<()> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        kind,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(invalid(&format!(
            "must be at most {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') || extra.contains(c)))
    {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }
    Ok(())
}

/// Validate a workflow name (`[A-Za-z0-9._-]{1,64}`).
pub fn validate_workflow_name(name: &str) -> Result<()> {
    check("workflow name", name, &[])
}

/// Validate a caller-supplied run id.
///
/// Run ids follow the workflow name rules and may also contain `:` and `+`.
/// Ids starting with [`RESERVED_RUN_PREFIX`] are rejected.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.starts_with(RESERVED_RUN_PREFIX) {
        return Err(ValidationError::ReservedPrefix(run_id.to_string()));
    }
    check("run id", run_id, &[':', '+'])
}

/// Generate a run id for callers that did not supply one.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
