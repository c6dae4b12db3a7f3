//! Metric accumulator contract
//!
//! Every metric instance is driven through [`Metric::update`]. RECORD metrics
//! receive one record per call and ignore the view; METRIC metrics receive no
//! record and read their dependencies from the view; BOTH metrics receive a
//! record and read their dependencies' per-record series.
//!
//! The generic accumulators here cover most metric kinds; each definition
//! unit under `types` only supplies a descriptor and a compute function.

use super::descriptor::{MetricDescriptor, MetricTag};
use super::error::{MetricsError, RecordFault};
use super::value::MetricValue;
use crate::records::ParsedResponseRecord;

/// Per-run accumulator of one metric kind
pub trait Metric: Send {
    /// Static description of this metric
    fn descriptor(&self) -> &'static MetricDescriptor;

    /// Feed one record (RECORD/BOTH) or nothing (METRIC).
    ///
    /// `finalized` exposes every metric evaluated before this one.
    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError>;

    /// Current accumulated value
    fn values(&self) -> &MetricValue;

    /// Called instead of a successful update when the record was rejected,
    /// so per-record series stay aligned with arrival order.
    fn skip_record(&mut self) {}

    /// Exact integer value, for metrics that track a timestamp
    fn timestamp(&self) -> Option<i64> {
        None
    }

    fn tag(&self) -> MetricTag {
        self.descriptor().tag
    }
}

/// Read-only access to metrics that precede the current one in evaluation order
pub struct MetricView<'a> {
    metrics: &'a [Box<dyn Metric>],
}

impl<'a> MetricView<'a> {
    pub fn new(metrics: &'a [Box<dyn Metric>]) -> Self {
        Self { metrics }
    }

    /// A view with nothing in it
    pub fn empty() -> MetricView<'static> {
        MetricView { metrics: &[] }
    }

    /// Value of `tag`, if it has been evaluated
    pub fn get(&self, tag: MetricTag) -> Option<&'a MetricValue> {
        self.metrics
            .iter()
            .find(|m| m.tag() == tag)
            .map(|m| m.values())
    }

    /// Scalar value of dependency `dependency`, as read by metric `owner`
    pub fn scalar(&self, owner: MetricTag, dependency: MetricTag) -> Result<f64, MetricsError> {
        self.get(dependency)
            .and_then(MetricValue::as_scalar)
            .ok_or_else(|| missing(owner, dependency))
    }

    /// Exact timestamp of dependency `dependency`, as read by metric `owner`
    pub fn timestamp(&self, owner: MetricTag, dependency: MetricTag) -> Result<i64, MetricsError> {
        self.metrics
            .iter()
            .find(|m| m.tag() == dependency)
            .and_then(|m| m.timestamp())
            .ok_or_else(|| missing(owner, dependency))
    }

    /// Per-record series of dependency `dependency`, as read by metric `owner`
    pub fn series(
        &self,
        owner: MetricTag,
        dependency: MetricTag,
    ) -> Result<&'a [Option<f64>], MetricsError> {
        self.get(dependency)
            .and_then(MetricValue::as_series)
            .ok_or_else(|| missing(owner, dependency))
    }
}

fn missing(owner: MetricTag, dependency: MetricTag) -> MetricsError {
    MetricsError::MissingDependencyValue {
        metric: owner.to_string(),
        dependency: dependency.to_string(),
    }
}

fn expect_record<'r>(
    descriptor: &MetricDescriptor,
    record: Option<&'r ParsedResponseRecord>,
) -> Result<&'r ParsedResponseRecord, MetricsError> {
    record.ok_or_else(|| MetricsError::InvalidInvocation {
        metric: descriptor.tag.to_string(),
        reason: "per-record metric called without a record",
    })
}

pub(crate) fn rejected(descriptor: &MetricDescriptor, fault: RecordFault) -> MetricsError {
    MetricsError::InvalidRecord {
        metric: descriptor.tag.to_string(),
        fault,
    }
}

/// Computes one value from a record
pub type RecordFn = fn(&ParsedResponseRecord) -> Result<f64, RecordFault>;

/// Computes one nanosecond timestamp from a record
pub type TimestampFn = fn(&ParsedResponseRecord) -> Result<i64, RecordFault>;

/// Computes one summary value from finalized metrics
pub type DeriveFn = fn(&MetricView<'_>) -> Result<f64, MetricsError>;

/// RECORD metric producing one series slot per record
pub struct SeriesMetric {
    descriptor: &'static MetricDescriptor,
    compute: RecordFn,
    value: MetricValue,
}

impl SeriesMetric {
    pub fn new(descriptor: &'static MetricDescriptor, compute: RecordFn) -> Self {
        Self {
            descriptor,
            compute,
            value: MetricValue::series(),
        }
    }
}

impl Metric for SeriesMetric {
    fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        _finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError> {
        let record = expect_record(self.descriptor, record)?;
        let value = (self.compute)(record).map_err(|fault| rejected(self.descriptor, fault))?;
        self.value.push(Some(value));
        Ok(())
    }

    fn values(&self) -> &MetricValue {
        &self.value
    }

    fn skip_record(&mut self) {
        self.value.push(None);
    }
}

/// RECORD metric folding every record into a single scalar
pub struct FoldMetric {
    descriptor: &'static MetricDescriptor,
    compute: RecordFn,
    fold: fn(f64, f64) -> f64,
    value: MetricValue,
}

impl FoldMetric {
    pub fn new(
        descriptor: &'static MetricDescriptor,
        compute: RecordFn,
        fold: fn(f64, f64) -> f64,
    ) -> Self {
        Self {
            descriptor,
            compute,
            fold,
            value: MetricValue::Unset,
        }
    }
}

impl Metric for FoldMetric {
    fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        _finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError> {
        let record = expect_record(self.descriptor, record)?;
        let value = (self.compute)(record).map_err(|fault| rejected(self.descriptor, fault))?;
        self.value = match self.value {
            MetricValue::Scalar(current) => MetricValue::Scalar((self.fold)(current, value)),
            _ => MetricValue::Scalar(value),
        };
        Ok(())
    }

    fn values(&self) -> &MetricValue {
        &self.value
    }
}

/// RECORD metric keeping an extreme timestamp across records.
///
/// The fold runs on `i64` so spans past 2^53 ns stay exact; the reported
/// value is the same timestamp as `f64`.
pub struct TimestampMetric {
    descriptor: &'static MetricDescriptor,
    compute: TimestampFn,
    fold: fn(i64, i64) -> i64,
    current: Option<i64>,
    value: MetricValue,
}

impl TimestampMetric {
    pub fn new(
        descriptor: &'static MetricDescriptor,
        compute: TimestampFn,
        fold: fn(i64, i64) -> i64,
    ) -> Self {
        Self {
            descriptor,
            compute,
            fold,
            current: None,
            value: MetricValue::Unset,
        }
    }
}

impl Metric for TimestampMetric {
    fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        _finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError> {
        let record = expect_record(self.descriptor, record)?;
        let ts = (self.compute)(record).map_err(|fault| rejected(self.descriptor, fault))?;
        let folded = match self.current {
            Some(current) => (self.fold)(current, ts),
            None => ts,
        };
        self.current = Some(folded);
        self.value = MetricValue::Scalar(folded as f64);
        Ok(())
    }

    fn values(&self) -> &MetricValue {
        &self.value
    }

    fn timestamp(&self) -> Option<i64> {
        self.current
    }
}

/// METRIC computed once from other metrics after the record stream ends
pub struct DerivedMetric {
    descriptor: &'static MetricDescriptor,
    derive: DeriveFn,
    value: MetricValue,
}

impl DerivedMetric {
    pub fn new(descriptor: &'static MetricDescriptor, derive: DeriveFn) -> Self {
        Self {
            descriptor,
            derive,
            value: MetricValue::Unset,
        }
    }
}

impl Metric for DerivedMetric {
    fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    fn update(
        &mut self,
        record: Option<&ParsedResponseRecord>,
        finalized: &MetricView<'_>,
    ) -> Result<(), MetricsError> {
        if record.is_some() {
            return Err(MetricsError::InvalidInvocation {
                metric: self.descriptor.tag.to_string(),
                reason: "summary metric called with a record",
            });
        }
        self.value = MetricValue::Scalar((self.derive)(finalized)?);
        Ok(())
    }

    fn values(&self) -> &MetricValue {
        &self.value
    }
}
