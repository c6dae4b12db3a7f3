//! Perf Lens
//!
//! Core of an inference benchmark: server-sent event parsing, per-request
//! timing records, and a dependency-ordered metrics engine producing
//! latency, token and throughput statistics.
//!
//! ```no_run
//! use perf_lens::config::EngineConfig;
//! use perf_lens::metrics::{MetricRegistry, MetricsEngine, RunOutcome};
//! use perf_lens::records::{ParsedResponseRecord, RequestRecord, ResponseData};
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = MetricRegistry::global()?;
//! let mut engine = MetricsEngine::new(registry, EngineConfig::default())?;
//!
//! let record = ParsedResponseRecord::new(
//!     RequestRecord::new(serde_json::Value::Null, 10),
//!     vec![ResponseData::new(15, Some(1))],
//! );
//! engine.process(&record)?;
//!
//! let summary = engine.finalize(RunOutcome::Completed)?;
//! println!("{}", serde_json::to_string_pretty(&summary)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod records;
pub mod stream;
pub mod telemetry;

pub use config::{ConfigError, EngineConfig, FailurePolicy};
pub use metrics::{MetricRegistry, MetricsEngine, MetricsError, MetricsSummary, RunOutcome};
