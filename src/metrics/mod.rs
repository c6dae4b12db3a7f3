//! Metric registry, dependency graph and evaluation engine
//!
//! Metric kinds are described by immutable [`MetricDescriptor`]s and
//! registered once in a [`MetricRegistry`]. A run resolves a selection into a
//! [`DependencyGraph`], instantiates one accumulator per metric and feeds
//! records through a [`MetricsEngine`].

mod consumer;
mod descriptor;
mod engine;
mod error;
mod graph;
mod metric;
mod registry;
mod summary;
mod value;

pub mod types;

pub use consumer::consume;
pub use descriptor::{MetricDescriptor, MetricKind, MetricTag, MetricUnit, TimeUnit};
pub use engine::{MetricsEngine, RunOutcome};
pub use error::{MetricsError, RecordFault};
pub use graph::DependencyGraph;
pub use metric::{
    DeriveFn, DerivedMetric, FoldMetric, Metric, MetricView, RecordFn, SeriesMetric, TimestampFn,
    TimestampMetric,
};
pub use registry::{DefinitionUnit, MetricConstructor, MetricEntry, MetricRegistry, RegistryBuilder};
pub use summary::{percentile, MetricResult, MetricsSummary};
pub use value::{rescale, MetricValue};

pub use types::latency::{INTER_TOKEN_LATENCY, REQUEST_LATENCY, TTFT, TTST};
pub use types::request::{
    BENCHMARK_DURATION, MAX_RESPONSE_TIMESTAMP, MIN_REQUEST_TIMESTAMP, REQUEST_COUNT,
};
pub use types::sequence::{INPUT_SEQUENCE_LENGTH, OUTPUT_SEQUENCE_LENGTH, TOTAL_OUTPUT_TOKENS};
pub use types::throughput::{
    OUTPUT_TOKEN_THROUGHPUT, OUTPUT_TOKEN_THROUGHPUT_PER_USER, REQUEST_THROUGHPUT,
};
