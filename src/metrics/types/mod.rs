//! Built-in metric definitions
//!
//! Each submodule is a definition unit: it declares descriptors and a
//! `register` function. [`DEFINITION_UNITS`] is the fixed list walked by
//! registry discovery.
//!
//! | unit | metrics |
//! |------|---------|
//! | [`latency`] | `request_latency`, `ttft`, `ttst`, `inter_token_latency` |
//! | [`sequence`] | `input_sequence_length`, `output_sequence_length`, `total_output_tokens` |
//! | [`request`] | `request_count`, `min_request_timestamp`, `max_response_timestamp`, `benchmark_duration` |
//! | [`throughput`] | `request_throughput`, `output_token_throughput`, `output_token_throughput_per_user` |

pub mod latency;
pub mod request;
pub mod sequence;
pub mod throughput;

use super::error::RecordFault;
use super::registry::DefinitionUnit;
use crate::records::{ParsedResponseRecord, ResponseData};

/// Every built-in definition unit, in discovery order
pub const DEFINITION_UNITS: &[DefinitionUnit] = &[
    latency::register,
    sequence::register,
    request::register,
    throughput::register,
];

/// Nanoseconds per second
pub(crate) const NANOS_PER_SEC: f64 = 1e9;

/// Start timestamp, checked to be positive
pub(crate) fn start_ns(record: &ParsedResponseRecord) -> Result<i64, RecordFault> {
    let start = record.start_perf_ns();
    if start <= 0 || start == i64::MAX {
        return Err(RecordFault::MissingTimestamp("request start"));
    }
    Ok(start)
}

/// Responses, checked to number at least `required` and to arrive in order
pub(crate) fn responses(
    record: &ParsedResponseRecord,
    required: usize,
) -> Result<&[ResponseData], RecordFault> {
    let responses = record.responses.as_slice();
    if responses.len() < required.max(1) {
        return Err(RecordFault::TooFewResponses {
            required: required.max(1),
            actual: responses.len(),
        });
    }
    for (index, response) in responses.iter().enumerate() {
        if response.perf_ns <= 0 || response.perf_ns == i64::MAX {
            return Err(RecordFault::MissingTimestamp("response"));
        }
        if index > 0 && response.perf_ns < responses[index - 1].perf_ns {
            return Err(RecordFault::NonMonotonic { index });
        }
    }
    Ok(responses)
}

/// Output token count, checked to be at least `required`
pub(crate) fn output_tokens(
    record: &ParsedResponseRecord,
    required: u64,
) -> Result<u64, RecordFault> {
    let count = record
        .output_token_count
        .ok_or(RecordFault::MissingTokenCount("output"))?;
    if count < required {
        return Err(RecordFault::InsufficientTokens {
            required,
            actual: count,
        });
    }
    Ok(count)
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn test_responses_checks() {
        assert_eq!(
            responses(&record(10, &[]), 1).unwrap_err(),
            RecordFault::TooFewResponses {
                required: 1,
                actual: 0
            }
        );
        assert_eq!(
            responses(&record(10, &[20]), 2).unwrap_err(),
            RecordFault::TooFewResponses {
                required: 2,
                actual: 1
            }
        );
        assert_eq!(
            responses(&record(10, &[20, 15]), 1).unwrap_err(),
            RecordFault::NonMonotonic { index: 1 }
        );
        assert_eq!(responses(&record(10, &[20, 30]), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_start_ns_checks() {
        assert!(start_ns(&record(0, &[1])).is_err());
        assert!(start_ns(&record(-5, &[1])).is_err());
        assert_eq!(start_ns(&record(5, &[6])), Ok(5));
    }
}
