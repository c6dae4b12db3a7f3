//! Metric engine errors

use thiserror::Error;

/// Why a record cannot be used by a particular metric
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFault {
    /// A required timestamp is missing or out of range
    #[error("missing or invalid {0} timestamp")]
    MissingTimestamp(&'static str),

    /// Not enough responses to compute the value
    #[error("requires at least {required} responses, got {actual}")]
    TooFewResponses { required: usize, actual: usize },

    /// A response arrived before the event it is measured from
    #[error("response {index} is earlier than the timestamp it follows")]
    NonMonotonic { index: usize },

    /// A required token count was not extracted
    #[error("missing {0} token count")]
    MissingTokenCount(&'static str),

    /// Token count below what the metric needs
    #[error("requires at least {required} tokens, got {actual}")]
    InsufficientTokens { required: u64, actual: u64 },

    /// A per-record dependency produced no value for this record
    #[error("dependency '{0}' has no value for this record")]
    MissingDependency(String),

    /// A divisor was zero
    #[error("{0} is zero")]
    ZeroValue(&'static str),
}

/// Errors raised while building or running the metrics engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// Tag is empty or contains characters outside `[a-z0-9_]`
    #[error("invalid metric tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: &'static str },

    /// Two metric kinds registered under one tag
    #[error("metric tag '{0}' is registered more than once")]
    DuplicateTag(String),

    /// A selected metric is not in the registry
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    /// A metric requires a tag that is not in the registry
    #[error("metric '{metric}' requires unknown metric '{dependency}'")]
    UnknownDependency { metric: String, dependency: String },

    /// The required-metric edges form a cycle
    #[error("dependency cycle between metrics: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Unit conversion requested for a metric that has no time unit
    #[error("metric '{0}' is dimensionless and cannot be rescaled")]
    NotATimeMetric(String),

    /// Record-level validation failure
    #[error("metric '{metric}' rejected record: {fault}")]
    InvalidRecord { metric: String, fault: RecordFault },

    /// A summary metric found its dependency without a value
    #[error("metric '{metric}' requires '{dependency}', which has no value")]
    MissingDependencyValue { metric: String, dependency: String },

    /// A summary metric could not produce a meaningful value
    #[error("metric '{metric}' cannot be derived: {reason}")]
    Derivation { metric: String, reason: String },

    /// Every selected metric was streaming-only in a non-streaming run
    #[error("no metric left to evaluate: {} require a streaming run", .0.join(", "))]
    NothingSelected(Vec<String>),

    /// A metric was driven in a pass that does not match its classification
    #[error("metric '{metric}' invoked incorrectly: {reason}")]
    InvalidInvocation { metric: String, reason: &'static str },
}

impl MetricsError {
    /// Whether this is a configuration error that must stop the run.
    ///
    /// Everything else concerns a single (metric, record) pair or a single
    /// summary value and is tallied instead of propagated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MetricsError::InvalidTag { .. }
                | MetricsError::DuplicateTag(_)
                | MetricsError::UnknownMetric(_)
                | MetricsError::UnknownDependency { .. }
                | MetricsError::DependencyCycle(_)
                | MetricsError::NotATimeMetric(_)
                | MetricsError::NothingSelected(_)
                | MetricsError::InvalidInvocation { .. }
        )
    }

    /// Validation fault, if this error came from a rejected record
    pub fn fault(&self) -> Option<&RecordFault> {
        match self {
            MetricsError::InvalidRecord { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
