//! Token count metrics

use super::output_tokens;
use crate::metrics::descriptor::{MetricDescriptor, MetricKind, MetricTag, MetricUnit};
use crate::metrics::error::{MetricsError, RecordFault};
use crate::metrics::metric::{DerivedMetric, Metric, MetricView, SeriesMetric};
use crate::metrics::registry::RegistryBuilder;
use crate::records::ParsedResponseRecord;

pub const INPUT_SEQUENCE_LENGTH: MetricTag = MetricTag::new("input_sequence_length");
pub const OUTPUT_SEQUENCE_LENGTH: MetricTag = MetricTag::new("output_sequence_length");
pub const TOTAL_OUTPUT_TOKENS: MetricTag = MetricTag::new("total_output_tokens");

pub static INPUT_SEQUENCE_LENGTH_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: INPUT_SEQUENCE_LENGTH,
    header: "Input Sequence Length",
    unit: MetricUnit::Dimensionless("tokens"),
    kind: MetricKind::Record,
    larger_is_better: false,
    streaming_only: false,
    required: &[],
};

pub static OUTPUT_SEQUENCE_LENGTH_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: OUTPUT_SEQUENCE_LENGTH,
    header: "Output Sequence Length",
    unit: MetricUnit::Dimensionless("tokens"),
    kind: MetricKind::Record,
    larger_is_better: false,
    streaming_only: false,
    required: &[],
};

pub static TOTAL_OUTPUT_TOKENS_DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    tag: TOTAL_OUTPUT_TOKENS,
    header: "Total Output Tokens",
    unit: MetricUnit::Dimensionless("tokens"),
    kind: MetricKind::Metric,
    larger_is_better: true,
    streaming_only: false,
    required: &[OUTPUT_SEQUENCE_LENGTH],
};

fn input_sequence_length(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    record
        .input_token_count
        .map(|n| n as f64)
        .ok_or(RecordFault::MissingTokenCount("input"))
}

fn output_sequence_length(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    output_tokens(record, 1).map(|n| n as f64)
}

fn total_output_tokens(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    let lengths = view.series(TOTAL_OUTPUT_TOKENS, OUTPUT_SEQUENCE_LENGTH)?;
    Ok(lengths.iter().flatten().sum())
}

fn build_input_sequence_length() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(
        &INPUT_SEQUENCE_LENGTH_DESCRIPTOR,
        input_sequence_length,
    ))
}

fn build_output_sequence_length() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(
        &OUTPUT_SEQUENCE_LENGTH_DESCRIPTOR,
        output_sequence_length,
    ))
}

fn build_total_output_tokens() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(
        &TOTAL_OUTPUT_TOKENS_DESCRIPTOR,
        total_output_tokens,
    ))
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&INPUT_SEQUENCE_LENGTH_DESCRIPTOR, build_input_sequence_length)?;
    builder.register(&OUTPUT_SEQUENCE_LENGTH_DESCRIPTOR, build_output_sequence_length)?;
    builder.register(&TOTAL_OUTPUT_TOKENS_DESCRIPTOR, build_total_output_tokens)?;
    Ok(())
}
