//! Execution-engine client abstraction for dagrun.
//!
//! The external DAG engine speaks two wire-protocol generations:
//!
//! - **experimental** (generation 1) correlates runs by execution timestamp
//!   and cannot detect a reused run id on its own.
//! - **stable** (generation 2) correlates by run id and answers a reused id
//!   with HTTP 409.
//!
//! Each generation is a [`WireProtocol`] strategy. An [`HttpEngine`] is built
//! once per resolved configuration with exactly one strategy and exposes the
//! generation-independent [`ExecutionEngine`] capability the orchestrator
//! depends on.
//!
//! # Example
//!
//! ```no_run
//! use dagrun_engine::{Credentials, EngineGeneration, ExecutionEngine, HttpEngine};
//!
//! # async fn example() -> dagrun_engine::Result<()> {
//! let engine = HttpEngine::builder()
//!     .base_url("http://airflow.internal:8080")
//!     .generation(EngineGeneration::Stable)
//!     .credentials(Credentials::bearer("secret"))
//!     .build()?;
//!
//! let conf = serde_json::json!({ "file": "s3://bucket/data.csv" });
//! let outcome = engine.trigger("csv_ingest", "run-42", &conf, "corr-1").await?;
//! println!("correlation token: {}", outcome.correlation_token);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod engine;
pub mod error;
pub mod experimental;
pub mod protocol;
pub mod stable;

pub use client::{EngineBuilder, HttpEngine};
pub use engine::{engine_conf, ExecutionEngine, SharedEngine};
pub use error::{EngineError, Result};
pub use experimental::ExperimentalProtocol;
pub use protocol::{
    Credentials, EngineGeneration, TriggerOutcome, TriggerRequest, WireProtocol,
};
pub use stable::StableProtocol;
