//! Request counting and benchmark time span

use super::{responses, start_ns};
use crate::metrics::descriptor::{MetricDescriptor, MetricKind, MetricTag, MetricUnit, TimeUnit};
use crate::metrics::error::{MetricsError, RecordFault};
use crate::metrics::metric::{DerivedMetric, FoldMetric, Metric, MetricView, TimestampMetric};
use crate::metrics::registry::RegistryBuilder;
use crate::records::ParsedResponseRecord;

pub const REQUEST_COUNT: MetricTag = MetricTag::new("request_count");
pub const MIN_REQUEST_TIMESTAMP: MetricTag = MetricTag::new("min_request_timestamp");
pub const MAX_RESPONSE_TIMESTAMP: MetricTag = MetricTag::new("max_response_timestamp");
pub const BENCHMARK_DURATION: MetricTag = MetricTag::new("benchmark_duration");

pub static REQUEST_COUNT_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: REQUEST_COUNT,
    header: "Request Count",
    unit: MetricUnit::Dimensionless("requests"),
    kind: MetricKind::Record,
    larger_is_better: true,
    streaming_only: false,
    required: &[],
};

pub static MIN_REQUEST_TIMESTAMP_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: MIN_REQUEST_TIMESTAMP,
    header: "Minimum Request Timestamp",
    unit: MetricUnit::Time(TimeUnit::Nanoseconds),
    kind: MetricKind::Record,
    larger_is_better: false,
    streaming_only: false,
    required: &[],
};

pub static MAX_RESPONSE_TIMESTAMP_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: MAX_RESPONSE_TIMESTAMP,
    header: "Maximum Response Timestamp",
    unit: MetricUnit::Time(TimeUnit::Nanoseconds),
    kind: MetricKind::Record,
    larger_is_better: false,
    streaming_only: false,
    required: &[],
};

pub static BENCHMARK_DURATION_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: BENCHMARK_DURATION,
    header: "Benchmark Duration",
    unit: MetricUnit::Time(TimeUnit::Nanoseconds),
    kind: MetricKind::Metric,
    larger_is_better: false,
    streaming_only: false,
    required: &[MIN_REQUEST_TIMESTAMP, MAX_RESPONSE_TIMESTAMP],
};

fn request_count(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    responses(record, 1)?;
    Ok(1.0)
}

fn request_start(record: &ParsedResponseRecord) -> Result<i64, RecordFault> {
    // only requests that produced a response bound the benchmark span
    responses(record, 1)?;
    start_ns(record)
}

fn last_response(record: &ParsedResponseRecord) -> Result<i64, RecordFault> {
    let responses = responses(record, 1)?;
    Ok(responses[responses.len() - 1].perf_ns)
}

fn benchmark_duration(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    let first = view.timestamp(BENCHMARK_DURATION, MIN_REQUEST_TIMESTAMP)?;
    let last = view.timestamp(BENCHMARK_DURATION, MAX_RESPONSE_TIMESTAMP)?;
    if last < first {
        return Err(MetricsError::Derivation {
            metric: BENCHMARK_DURATION.to_string(),
            reason: format!("last response ({last}) precedes first request ({first})"),
        });
    }
    // both bounds are positive, so the difference fits
    Ok((last - first) as f64)
}

fn build_request_count() -> Box<dyn Metric> {
    Box::new(FoldMetric::new(&REQUEST_COUNT_DESCRIPTOR, request_count, |a, b| a + b))
}

fn build_min_request_timestamp() -> Box<dyn Metric> {
    Box::new(TimestampMetric::new(
        &MIN_REQUEST_TIMESTAMP_DESCRIPTOR,
        request_start,
        std::cmp::min,
    ))
}

fn build_max_response_timestamp() -> Box<dyn Metric> {
    Box::new(TimestampMetric::new(
        &MAX_RESPONSE_TIMESTAMP_DESCRIPTOR,
        last_response,
        std::cmp::max,
    ))
}

fn build_benchmark_duration() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(
        &BENCHMARK_DURATION_DESCRIPTOR,
        benchmark_duration,
    ))
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&REQUEST_COUNT_DESCRIPTOR, build_request_count)?;
    builder.register(&MIN_REQUEST_TIMESTAMP_DESCRIPTOR, build_min_request_timestamp)?;
    builder.register(&MAX_RESPONSE_TIMESTAMP_DESCRIPTOR, build_max_response_timestamp)?;
    builder.register(&BENCHMARK_DURATION_DESCRIPTOR, build_benchmark_duration)?;
    Ok(())
}
