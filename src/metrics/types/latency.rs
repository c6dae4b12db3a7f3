//! Per-request latency metrics

use super::{output_tokens, responses, start_ns};
use crate::metrics::descriptor::{MetricDescriptor, MetricKind, MetricTag, MetricUnit, TimeUnit};
use crate::metrics::error::{MetricsError, RecordFault};
use crate::metrics::metric::{Metric, SeriesMetric};
use crate::metrics::registry::RegistryBuilder;
use crate::records::ParsedResponseRecord;

pub const REQUEST_LATENCY: MetricTag = MetricTag::new("request_latency");
pub const TTFT: MetricTag = MetricTag::new("ttft");
pub const TTST: MetricTag = MetricTag::new("ttst");
pub const INTER_TOKEN_LATENCY: MetricTag = MetricTag::new("inter_token_latency");

const fn latency(tag: MetricTag, header: &'static str, streaming_only: bool) -> MetricDescriptor {
    MetricDescriptor {
        tag,
        header,
        unit: MetricUnit::Time(TimeUnit::Nanoseconds),
        kind: MetricKind::Record,
        larger_is_better: false,
        streaming_only,
        required: &[],
    }
}

pub static REQUEST_LATENCY_DESCRIPTOR: MetricDescriptor =
    latency(REQUEST_LATENCY, "Request Latency", false);
pub static TTFT_DESCRIPTOR: MetricDescriptor = latency(TTFT, "Time to First Token", true);
pub static TTST_DESCRIPTOR: MetricDescriptor = latency(TTST, "Time to Second Token", true);
pub static INTER_TOKEN_LATENCY_DESCRIPTOR: MetricDescriptor =
    latency(INTER_TOKEN_LATENCY, "Inter Token Latency", true);

/// Dispatch to last response
fn request_latency(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    let start = start_ns(record)?;
    let responses = responses(record, 1)?;
    let last = responses[responses.len() - 1].perf_ns;
    if last < start {
        return Err(RecordFault::NonMonotonic {
            index: responses.len() - 1,
        });
    }
    Ok((last - start) as f64)
}

/// Dispatch to first response
fn ttft(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    let start = start_ns(record)?;
    let first = responses(record, 1)?[0].perf_ns;
    if first < start {
        return Err(RecordFault::NonMonotonic { index: 0 });
    }
    Ok((first - start) as f64)
}

/// First to second response
fn ttst(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    let responses = responses(record, 2)?;
    Ok((responses[1].perf_ns - responses[0].perf_ns) as f64)
}

/// Generation time after the first token, spread over the remaining tokens
fn inter_token_latency(record: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    let tokens = output_tokens(record, 2)?;
    let responses = responses(record, 1)?;
    let span = responses[responses.len() - 1].perf_ns - responses[0].perf_ns;
    Ok(span as f64 / (tokens - 1) as f64)
}

fn build_request_latency() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(&REQUEST_LATENCY_DESCRIPTOR, request_latency))
}

fn build_ttft() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(&TTFT_DESCRIPTOR, ttft))
}

fn build_ttst() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(&TTST_DESCRIPTOR, ttst))
}

fn build_inter_token_latency() -> Box<dyn Metric> {
    Box::new(SeriesMetric::new(
        &INTER_TOKEN_LATENCY_DESCRIPTOR,
        inter_token_latency,
    ))
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&REQUEST_LATENCY_DESCRIPTOR, build_request_latency)?;
    builder.register(&TTFT_DESCRIPTOR, build_ttft)?;
    builder.register(&TTST_DESCRIPTOR, build_ttst)?;
    builder.register(&INTER_TOKEN_LATENCY_DESCRIPTOR, build_inter_token_latency)?;
    Ok(())
}
