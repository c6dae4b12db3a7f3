//! Records enriched with extracted text and token counts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::{in_open_range, RequestRecord};

/// Extracted content of one response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Receive timestamp (nanoseconds, monotonic clock)
    pub perf_ns: i64,
    /// Raw text fragments as received
    #[serde(default)]
    pub raw_text: Vec<String>,
    /// Text fragments after extraction
    #[serde(default)]
    pub parsed_text: Vec<String>,
    /// Tokens contained in this response, if tokenized
    #[serde(default)]
    pub token_count: Option<u64>,
    /// Extra fields reported by the extractor
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ResponseData {
    /// Create response data at `perf_ns` carrying `token_count` tokens
    pub fn new(perf_ns: i64, token_count: Option<u64>) -> Self {
        Self {
            perf_ns,
            token_count,
            ..Default::default()
        }
    }

    /// Attach a parsed text fragment
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parsed_text.push(text.into());
        self
    }
}

/// Completed request plus extraction output; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponseRecord {
    /// Underlying request record
    pub request: RequestRecord,
    /// Worker that issued the request
    #[serde(default)]
    pub worker_id: Option<String>,
    /// Conversation this request belongs to
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Turn index within the conversation
    #[serde(default)]
    pub turn_index: Option<u32>,
    /// Model that served the request
    #[serde(default)]
    pub model_name: Option<String>,
    /// Prompt token count
    #[serde(default)]
    pub input_token_count: Option<u64>,
    /// Sum of per-response token counts
    #[serde(default)]
    pub output_token_count: Option<u64>,
    /// Extracted responses in arrival order
    #[serde(default)]
    pub responses: Vec<ResponseData>,
}

impl ParsedResponseRecord {
    /// Build a parsed record; the output token count is summed from `responses`.
    ///
    /// When no response carries a token count the output count is `None`.
    pub fn new(request: RequestRecord, responses: Vec<ResponseData>) -> Self {
        let output_token_count = responses
            .iter()
            .filter_map(|r| r.token_count)
            .fold(None, |acc: Option<u64>, n| Some(acc.unwrap_or(0) + n));

        Self {
            request,
            worker_id: None,
            conversation_id: None,
            turn_index: None,
            model_name: None,
            input_token_count: None,
            output_token_count,
            responses,
        }
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>, turn_index: u32) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self.turn_index = Some(turn_index);
        self
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn with_input_tokens(mut self, count: u64) -> Self {
        self.input_token_count = Some(count);
        self
    }

    /// Dispatch timestamp of the underlying request
    pub fn start_perf_ns(&self) -> i64 {
        self.request.start_perf_ns
    }

    /// Whether the underlying request failed upstream
    pub fn is_error(&self) -> bool {
        self.request.error.is_some()
    }

    /// Whether the record can be used for timing.
    ///
    /// Same rule as [`RequestRecord::is_valid`], applied to the extracted
    /// responses: no error, a start timestamp in `(0, i64::MAX)`, at least one
    /// response, and every response timestamp in `(0, i64::MAX)`.
    pub fn is_valid(&self) -> bool {
        self.request.error.is_none()
            && in_open_range(self.request.start_perf_ns)
            && !self.responses.is_empty()
            && self.responses.iter().all(|r| in_open_range(r.perf_ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tokens_are_summed() {
        let request = RequestRecord::new(serde_json::Value::Null, 10);
        let record = ParsedResponseRecord::new(
            request,
            vec![
                ResponseData::new(20, Some(3)),
                ResponseData::new(30, None),
                ResponseData::new(40, Some(4)),
            ],
        );
        assert_eq!(record.output_token_count, Some(7));
    }

    #[test]
    fn test_output_tokens_absent_without_counts() {
        let request = RequestRecord::new(serde_json::Value::Null, 10);
        let record = ParsedResponseRecord::new(request, vec![ResponseData::new(20, None)]);
        assert_eq!(record.output_token_count, None);
    }

    #[test]
    fn test_validity_uses_extracted_responses() {
        let request = RequestRecord::new(serde_json::Value::Null, 10);
        let with = |request: &RequestRecord, responses: Vec<ResponseData>| {
            ParsedResponseRecord::new(request.clone(), responses).is_valid()
        };

        assert!(with(&request, vec![ResponseData::new(15, None)]));
        assert!(!with(&request, Vec::new()));
        assert!(!with(&request, vec![ResponseData::new(i64::MAX, None)]));

        let no_start = RequestRecord::new(serde_json::Value::Null, 0);
        assert!(!with(&no_start, vec![ResponseData::new(15, None)]));
    }

    #[test]
    fn test_builder_fields() {
        let request = RequestRecord::new(serde_json::Value::Null, 10);
        let record = ParsedResponseRecord::new(request, Vec::new())
            .with_worker("worker-0")
            .with_conversation("conv-1", 2)
            .with_model("llama")
            .with_input_tokens(128);

        assert_eq!(record.worker_id.as_deref(), Some("worker-0"));
        assert_eq!(record.turn_index, Some(2));
        assert_eq!(record.model_name.as_deref(), Some("llama"));
        assert_eq!(record.input_token_count, Some(128));
        assert_eq!(record.start_perf_ns(), 10);
    }
}
