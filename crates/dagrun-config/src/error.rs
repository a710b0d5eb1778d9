//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field.
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// The partition provider failed or does not know the tenant.
    #[error("partition provider error for '{tenant}': {message}")]
    Provider { tenant: String, message: String },

    /// An engine handle could not be built from the resolved values.
    #[error("invalid engine configuration: {0}")]
    Engine(#[from] dagrun_engine::EngineError),
}
