//! Request record and its timing model
//!
//! A [`RequestRecord`] is created when a request is dispatched, receives one
//! [`ResponseEntry`] per arriving chunk, and is finalized when the request
//! completes or fails. All derived timings are gated by [`RequestRecord::is_valid`]
//! and come back as `None` instead of failing.

use serde::{Deserialize, Serialize};

use super::error::ErrorDetail;
use crate::stream::StreamMessage;

/// Plain (non-streamed) response body received at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResponse {
    /// Receive timestamp (nanoseconds, monotonic clock)
    pub perf_ns: i64,
    /// Raw body text
    pub text: String,
}

/// One response received for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEntry {
    /// Parsed event-stream chunk
    Stream(StreamMessage),
    /// Whole-body response
    Text(TextResponse),
}

impl ResponseEntry {
    /// Receive timestamp of this response
    pub fn perf_ns(&self) -> i64 {
        match self {
            ResponseEntry::Stream(message) => message.perf_ns,
            ResponseEntry::Text(text) => text.perf_ns,
        }
    }

    /// Whether this response is a stream message terminated by `[DONE]`
    pub fn is_done_marker(&self) -> bool {
        match self {
            ResponseEntry::Stream(message) => message.ends_with_done_marker(),
            ResponseEntry::Text(_) => false,
        }
    }
}

impl From<StreamMessage> for ResponseEntry {
    fn from(message: StreamMessage) -> Self {
        ResponseEntry::Stream(message)
    }
}

impl From<TextResponse> for ResponseEntry {
    fn from(text: TextResponse) -> Self {
        ResponseEntry::Text(text)
    }
}

/// Timing and outcome of a single inference request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request payload as sent
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Dispatch timestamp (nanoseconds, monotonic clock)
    pub start_perf_ns: i64,
    /// Completion timestamp
    #[serde(default)]
    pub end_perf_ns: Option<i64>,
    /// Timestamp at which the first byte of the response arrived
    #[serde(default)]
    pub recv_start_perf_ns: Option<i64>,
    /// HTTP status code
    #[serde(default)]
    pub status: Option<u16>,
    /// Responses in arrival order
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
    /// Failure detail, if the request failed upstream
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    /// Whether the request was sent later than scheduled
    #[serde(default)]
    pub delayed: bool,
}

impl RequestRecord {
    /// Create a record for a request dispatched at `start_perf_ns`
    pub fn new(payload: serde_json::Value, start_perf_ns: i64) -> Self {
        Self {
            payload,
            start_perf_ns,
            end_perf_ns: None,
            recv_start_perf_ns: None,
            status: None,
            responses: Vec::new(),
            error: None,
            delayed: false,
        }
    }

    /// Record the arrival of the first response byte
    pub fn set_first_byte(&mut self, perf_ns: i64) {
        self.recv_start_perf_ns = Some(perf_ns);
    }

    /// Append a response
    pub fn push_response(&mut self, response: impl Into<ResponseEntry>) {
        self.responses.push(response.into());
    }

    /// Mark the request as completed
    pub fn complete(&mut self, end_perf_ns: i64, status: Option<u16>) {
        self.end_perf_ns = Some(end_perf_ns);
        self.status = status;
    }

    /// Mark the request as failed
    pub fn fail(&mut self, error: ErrorDetail) {
        self.error = Some(error);
    }

    /// Whether the record can be used for timing.
    ///
    /// A record is valid when it has no error, a start timestamp strictly
    /// between 0 and `i64::MAX`, at least one response, and every response
    /// timestamp strictly between 0 and `i64::MAX`.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
            && in_open_range(self.start_perf_ns)
            && !self.responses.is_empty()
            && self.responses.iter().all(|r| in_open_range(r.perf_ns()))
    }

    /// Time from dispatch to the first response
    pub fn time_to_first_response(&self) -> Option<i64> {
        let first = self.valid_responses()?.first()?;
        Some(first.perf_ns() - self.start_perf_ns)
    }

    /// Time between the first and second responses
    pub fn time_to_second_response(&self) -> Option<i64> {
        let responses = self.valid_responses()?;
        if responses.len() < 2 {
            return None;
        }
        Some(responses[1].perf_ns() - responses[0].perf_ns())
    }

    /// Time from dispatch to completion
    pub fn time_to_last_response(&self) -> Option<i64> {
        self.valid_responses()?;
        self.end_perf_ns?.checked_sub(self.start_perf_ns)
    }

    /// Average spacing between consecutive responses.
    ///
    /// A trailing stream message that ends with `[DONE]` carries no token and
    /// is left out of both the span and the divisor.
    pub fn inter_token_latency(&self) -> Option<f64> {
        let responses = self.valid_responses()?;
        if responses.len() < 2 {
            return None;
        }

        let counted = match responses.last() {
            Some(last) if last.is_done_marker() => &responses[..responses.len() - 1],
            _ => responses,
        };
        if counted.len() < 2 {
            return None;
        }

        let first = counted[0].perf_ns();
        let last = counted[counted.len() - 1].perf_ns();
        Some((last - first) as f64 / (counted.len() - 1) as f64)
    }

    /// Latency of the response at `index`.
    ///
    /// The first response is measured from the first-byte timestamp, later
    /// ones from the previous response. `None` when the difference does not
    /// fit in an `i64`.
    pub fn token_latency(&self, index: usize) -> Option<i64> {
        let responses = self.valid_responses()?;
        let current = responses.get(index)?.perf_ns();
        let previous = if index == 0 {
            self.recv_start_perf_ns?
        } else {
            responses[index - 1].perf_ns()
        };
        current.checked_sub(previous)
    }

    fn valid_responses(&self) -> Option<&[ResponseEntry]> {
        if self.is_valid() {
            Some(&self.responses)
        } else {
            None
        }
    }
}

pub(crate) fn in_open_range(ts: i64) -> bool {
    ts > 0 && ts < i64::MAX
}
