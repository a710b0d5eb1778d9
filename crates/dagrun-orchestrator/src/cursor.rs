//! Opaque pagination cursors.
//!
//! A cursor is the repository's native page token wrapped in URL-safe
//! base64 (no padding) so it can travel in a query string untouched. The
//! codec knows nothing about what the token means.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

/// Result type for cursor operations.
pub type Result<T> = std::result::Result<T, CursorError>;

/// Cursor encoding failures. Both surface as invalid-argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// No token or cursor was supplied.
    #[error("{0} must not be null")]
    Missing(&'static str),

    /// The cursor is not the output of [`encode`].
    #[error("malformed cursor: {0}")]
    Malformed(String),
}

/// Wrap a native page token.
pub fn encode(token: Option<&str>) -> Result<String> {
    let token = token.ok_or(CursorError::Missing("page token"))?;
    Ok(URL_SAFE_NO_PAD.encode(token.as_bytes()))
}

/// Recover the native page token from a cursor.
pub fn decode(cursor: Option<&str>) -> Result<String> {
    let cursor = cursor.ok_or(CursorError::Missing("cursor"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.as_bytes())
        .map_err(|e| CursorError::Malformed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CursorError::Malformed(e.to_string()))
}
