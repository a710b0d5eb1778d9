//! Configuration for dagrun.
//!
//! - [`ServiceConfig`]: deployment-wide TOML settings (default engine,
//!   system-workflow engine, cache policy).
//! - [`PartitionProvider`]: per-tenant settings collaborator.
//! - [`ConfigResolver`]: turns a tenant id into a ready engine handle,
//!   memoized in a [`ConfigCache`] with a fixed TTL and bounded capacity.
//!
//! # Example
//!
//! ```rust,ignore
//! use dagrun_config::{ConfigCache, ConfigResolver, ServiceConfig};
//!
//! let config = ServiceConfig::from_toml(include_str!("dagrun.toml"))?;
//! let cache = ConfigCache::new(config.cache.to_cache_config());
//! let resolver = ConfigResolver::new(&config, provider, cache)?;
//!
//! let engine = resolver.resolve_config("tenant-a").await?;
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod types;

pub use cache::{CacheConfig, ConfigCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use error::{ConfigError, Result};
pub use provider::{PartitionInfo, PartitionProvider, StaticPartitionProvider};
pub use resolver::{
    ConfigResolver, EngineConfig, EngineFactory, HttpEngineFactory, ResolvedEngine,
};
pub use types::{load_config_file, CacheSection, EngineSection, ServiceConfig};
