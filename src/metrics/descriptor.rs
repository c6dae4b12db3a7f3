//! Static metric descriptors
//!
//! A [`MetricDescriptor`] is the immutable description of a metric kind:
//! its tag, unit, display header, evaluation class and the metrics it reads.
//! Descriptors are `'static` values, so they can be inspected for formatting
//! without building an accumulator.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::MetricsError;

/// Unique identifier of a metric kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricTag(&'static str);

impl MetricTag {
    /// Create a tag. Syntax is checked at registration.
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Check that the tag is non-empty lowercase snake case
    pub fn validate(&self) -> Result<(), MetricsError> {
        let invalid = |reason| MetricsError::InvalidTag {
            tag: self.0.to_string(),
            reason,
        };

        let first = self.0.chars().next().ok_or_else(|| invalid("tag is empty"))?;
        if !first.is_ascii_lowercase() {
            return Err(invalid("tag must start with a lowercase letter"));
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("tag may only contain a-z, 0-9 and '_'"));
        }
        Ok(())
    }
}

impl fmt::Display for MetricTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for MetricTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Time scales, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// Power of ten of one unit, in seconds
    pub fn exponent(&self) -> i32 {
        match self {
            TimeUnit::Nanoseconds => -9,
            TimeUnit::Microseconds => -6,
            TimeUnit::Milliseconds => -3,
            TimeUnit::Seconds => 0,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    ///
    /// Division is used for downscaling so that whole multiples convert
    /// exactly.
    pub fn convert(&self, value: f64, target: TimeUnit) -> f64 {
        let exp = self.exponent() - target.exponent();
        if exp >= 0 {
            value * 10f64.powi(exp)
        } else {
            value / 10f64.powi(-exp)
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ns" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "µs" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "sec" | "seconds" => Ok(TimeUnit::Seconds),
            other => Err(format!("unknown time unit '{}'", other)),
        }
    }
}

/// Unit a metric is reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    /// Duration or timestamp in the given scale
    Time(TimeUnit),
    /// Count or rate with a display label, e.g. `"tokens/sec"`
    Dimensionless(&'static str),
}

impl MetricUnit {
    pub fn time_unit(&self) -> Option<TimeUnit> {
        match self {
            MetricUnit::Time(unit) => Some(*unit),
            MetricUnit::Dimensionless(_) => None,
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricUnit::Time(unit) => unit.fmt(f),
            MetricUnit::Dimensionless(label) => f.write_str(label),
        }
    }
}

/// Which evaluation pass drives a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// One value per record, computed from the record alone
    Record,
    /// One summary value computed from other metrics after all records
    Metric,
    /// One value per record, computed from the record and other metrics'
    /// per-record values
    Both,
}

impl MetricKind {
    /// Whether this metric takes part in the per-record pass
    pub fn consumes_records(&self) -> bool {
        matches!(self, MetricKind::Record | MetricKind::Both)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Record => "RECORD",
            MetricKind::Metric => "METRIC",
            MetricKind::Both => "BOTH",
        };
        f.write_str(name)
    }
}

/// Immutable description of a metric kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub tag: MetricTag,
    /// Display header
    pub header: &'static str,
    pub unit: MetricUnit,
    pub kind: MetricKind,
    pub larger_is_better: bool,
    /// Only meaningful for streamed responses
    pub streaming_only: bool,
    /// Metrics whose finalized values this metric reads
    pub required: &'static [MetricTag],
}

impl MetricDescriptor {
    /// Whether `tag` is a direct dependency
    pub fn requires(&self, tag: MetricTag) -> bool {
        self.required.contains(&tag)
    }
}
