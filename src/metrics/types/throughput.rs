//! Throughput metrics

use super::latency::INTER_TOKEN_LATENCY;
use super::request::{BENCHMARK_DURATION, REQUEST_COUNT};
use super::sequence::TOTAL_OUTPUT_TOKENS;
use super::NANOS_PER_SEC;
use crate::metrics::descriptor::{MetricDescriptor, MetricKind, MetricTag, MetricUnit};
use crate::metrics::error::{MetricsError, RecordFault};
use crate::metrics::metric::{rejected, DerivedMetric, Metric, MetricView};
use crate::metrics::registry::RegistryBuilder;
use crate::metrics::value::MetricValue;
use crate::records::ParsedResponseRecord;

pub const REQUEST_THROUGHPUT: MetricTag = MetricTag::new("request_throughput");
pub const OUTPUT_TOKEN_THROUGHPUT: MetricTag = MetricTag::new("output_token_throughput");
pub const OUTPUT_TOKEN_THROUGHPUT_PER_USER: MetricTag =
    MetricTag::new("output_token_throughput_per_user");

pub static REQUEST_THROUGHPUT_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: REQUEST_THROUGHPUT,
    header: "Request Throughput",
    unit: MetricUnit::Dimensionless("requests/sec"),
    kind: MetricKind::Metric,
    larger_is_better: true,
    streaming_only: false,
    required: &[REQUEST_COUNT, BENCHMARK_DURATION],
};

pub static OUTPUT_TOKEN_THROUGHPUT_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: OUTPUT_TOKEN_THROUGHPUT,
    header: "Output Token Throughput",
    unit: MetricUnit::Dimensionless("tokens/sec"),
    kind: MetricKind::Metric,
    larger_is_better: true,
    streaming_only: false,
    required: &[TOTAL_OUTPUT_TOKENS, BENCHMARK_DURATION],
};

pub static OUTPUT_TOKEN_THROUGHPUT_PER_USER_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: OUTPUT_TOKEN_THROUGHPUT_PER_USER,
    header: "Output Token Throughput Per User",
    unit: MetricUnit::Dimensionless("tokens/sec/user"),
    kind: MetricKind::Both,
    larger_is_better: true,
    streaming_only: true,
    required: &[INTER_TOKEN_LATENCY],
};

/// `count / duration`, with duration in nanoseconds
fn per_second(owner: MetricTag, count: f64, duration_ns: f64) -> Result<f64, MetricsError> {
    if duration_ns <= 0.0 {
        return Err(MetricsError::Derivation {
            metric: owner.to_string(),
            reason: "benchmark duration is zero".to_string(),
        });
    }
    Ok(count / (duration_ns / NANOS_PER_SEC))
}

fn request_throughput(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    let count = view.scalar(REQUEST_THROUGHPUT, REQUEST_COUNT)?;
    let duration = view.scalar(REQUEST_THROUGHPUT, BENCHMARK_DURATION)?;
    per_second(REQUEST_THROUGHPUT, count, duration)
}

fn output_token_throughput(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    let tokens = view.scalar(OUTPUT_TOKEN_THROUGHPUT, TOTAL_OUTPUT_TOKENS)?;
    let duration = view.scalar(OUTPUT_TOKEN_THROUGHPUT, BENCHMARK_DURATION)?;
    per_second(OUTPUT_TOKEN_THROUGHPUT, tokens, duration)
}

/// Token rate seen by a single user, from the per-record inter-token latency.
///
/// Walks the inter-token latency series with its own cursor, one slot per
/// record, so it relies on every per-record metric seeing records in the same
/// order.
pub struct OutputTokenThroughputPerUser {
    cursor: usize,
    value: MetricValue,
}

impl OutputTokenThroughputPerUser {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            value: MetricValue::series(),
        }
    }
}

impl Default for OutputTokenThroughputPerUser {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for OutputTokenThroughputPerUser {
    fn descriptor(&self) -> &'static MetricDescriptor {
        &OUTPUT_TOKEN_THROUGHPUT_PER_USER_DESCRIPTOR
    }

    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError> {
        if record.is_none() {
            return Err(MetricsError::InvalidInvocation {
                metric: OUTPUT_TOKEN_THROUGHPUT_PER_USER.to_string(),
                reason: "per-record metric called without a record",
            });
        }

        let index = self.cursor;
        self.cursor += 1;

        let series = finalized.series(OUTPUT_TOKEN_THROUGHPUT_PER_USER, INTER_TOKEN_LATENCY)?;
        let itl = series.get(index).copied().flatten().ok_or_else(|| {
            rejected(
                self.descriptor(),
                RecordFault::MissingDependency(INTER_TOKEN_LATENCY.to_string()),
            )
        })?;
        if itl <= 0.0 {
            return Err(rejected(
                self.descriptor(),
                RecordFault::ZeroValue("inter token latency"),
            ));
        }

        self.value.push(Some(NANOS_PER_SEC / itl));
        Ok(())
    }

    fn values(&self) -> &MetricValue {
        &self.value
    }

    fn skip_record(&mut self) {
        self.value.push(None);
    }
}

fn build_request_throughput() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(
        &REQUEST_THROUGHPUT_DESCRIPTOR,
        request_throughput,
    ))
}

fn build_output_token_throughput() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(
        &OUTPUT_TOKEN_THROUGHPUT_DESCRIPTOR,
        output_token_throughput,
    ))
}

fn build_output_token_throughput_per_user() -> Box<dyn Metric> {
    Box::new(OutputTokenThroughputPerUser::new())
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&REQUEST_THROUGHPUT_DESCRIPTOR, build_request_throughput)?;
    builder.register(&OUTPUT_TOKEN_THROUGHPUT_DESCRIPTOR, build_output_token_throughput)?;
    builder.register(
        &OUTPUT_TOKEN_THROUGHPUT_PER_USER_DESCRIPTOR,
        build_output_token_throughput_per_user,
    )?;
    Ok(())
}
