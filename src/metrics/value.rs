//! Accumulated metric values and unit conversion

use serde::{Deserialize, Serialize};

use super::descriptor::{MetricDescriptor, TimeUnit};
use super::error::MetricsError;

/// State accumulated by a metric instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    /// Nothing computed yet
    #[default]
    Unset,
    /// Single summary value
    Scalar(f64),
    /// One slot per record fed to the engine, in arrival order.
    /// `None` marks a record this metric could not use.
    Series(Vec<Option<f64>>),
}

impl MetricValue {
    /// Empty per-record series
    pub fn series() -> Self {
        MetricValue::Series(Vec::new())
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Option<f64>]> {
        match self {
            MetricValue::Series(slots) => Some(slots),
            _ => None,
        }
    }

    /// Append a slot to a series. A non-series value becomes a series.
    pub fn push(&mut self, slot: Option<f64>) {
        match self {
            MetricValue::Series(slots) => slots.push(slot),
            _ => *self = MetricValue::Series(vec![slot]),
        }
    }

    /// Values actually computed, skipping empty slots
    pub fn realized(&self) -> Vec<f64> {
        match self {
            MetricValue::Unset => Vec::new(),
            MetricValue::Scalar(v) => vec![*v],
            MetricValue::Series(slots) => slots.iter().flatten().copied().collect(),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, MetricValue::Unset)
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> MetricValue {
        match self {
            MetricValue::Unset => MetricValue::Unset,
            MetricValue::Scalar(v) => MetricValue::Scalar(f(*v)),
            MetricValue::Series(slots) => {
                MetricValue::Series(slots.iter().map(|slot| slot.map(&f)).collect())
            }
        }
    }
}

/// Convert the values of a time metric into `target`.
///
/// Every value is multiplied by `10^(source - target)`, where each unit is
/// ranked by its power of ten. Dimensionless metrics cannot be rescaled.
pub fn rescale(
    descriptor: &MetricDescriptor,
    value: &MetricValue,
    target: TimeUnit,
) -> Result<MetricValue, MetricsError> {
    let source = descriptor
        .unit
        .time_unit()
        .ok_or_else(|| MetricsError::NotATimeMetric(descriptor.tag.to_string()))?;
    Ok(value.map(|v| source.convert(v, target)))
}
