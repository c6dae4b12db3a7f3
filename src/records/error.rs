//! Upstream request failures and their aggregation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Failure attached to a request record by the transport layer.
///
/// Two details are the same failure when code, type and message all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Numeric code (usually the HTTP status)
    #[serde(default)]
    pub code: Option<u16>,
    /// Error type label, e.g. `"Timeout"`
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl ErrorDetail {
    /// Create a new error detail
    pub fn new(code: Option<u16>, error_type: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code,
            error_type: error_type.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.error_type.as_deref()) {
            (Some(code), Some(kind)) => write!(f, "{} {}: {}", code, kind, self.message),
            (Some(code), None) => write!(f, "{}: {}", code, self.message),
            (None, Some(kind)) => write!(f, "{}: {}", kind, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Occurrence count of one distinct failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    /// The failure
    pub error: ErrorDetail,
    /// How many records carried it
    pub count: u64,
}

/// Failed requests grouped by error detail
#[derive(Debug, Clone, Default)]
pub struct ErrorSummary {
    counts: HashMap<ErrorDetail, u64>,
    was_cancelled: bool,
}

impl ErrorSummary {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `error`
    pub fn record(&mut self, error: &ErrorDetail) {
        *self.counts.entry(error.clone()).or_insert(0) += 1;
    }

    /// Flag the run as cancelled before all requests completed
    pub fn mark_cancelled(&mut self) {
        self.was_cancelled = true;
    }

    /// Whether the run was cancelled early
    pub fn was_cancelled(&self) -> bool {
        self.was_cancelled
    }

    /// Total number of failed records
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct failures
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Whether no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Occurrence count for a specific failure
    pub fn count_of(&self, error: &ErrorDetail) -> u64 {
        self.counts.get(error).copied().unwrap_or(0)
    }

    /// Entries sorted by count, most frequent first, ties by message
    pub fn entries(&self) -> Vec<ErrorCount> {
        let mut entries: Vec<ErrorCount> = self
            .counts
            .iter()
            .map(|(error, count)| ErrorCount {
                error: error.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.error.message.cmp(&b.error.message))
                .then_with(|| a.error.code.cmp(&b.error.code))
                .then_with(|| a.error.error_type.cmp(&b.error.error_type))
        });
        entries
    }

    /// Serializable snapshot for exporters
    pub fn report(&self) -> ErrorSummaryReport {
        ErrorSummaryReport {
            total: self.total(),
            entries: self.entries(),
            was_cancelled: self.was_cancelled,
        }
    }
}

/// Exported form of [`ErrorSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummaryReport {
    /// Total failed records
    pub total: u64,
    /// Distinct failures, most frequent first
    pub entries: Vec<ErrorCount>,
    /// Whether the run stopped early
    pub was_cancelled: bool,
}
