//! Run summary
//!
//! Statistics over each metric's realized values, reported in the configured
//! display unit, plus the error summary and the partial flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::descriptor::{MetricDescriptor, MetricKind, TimeUnit};
use super::error::MetricsError;
use super::value::{rescale, MetricValue};
use crate::records::ErrorSummaryReport;

/// Statistics for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub tag: String,
    pub header: String,
    /// Unit the statistics are expressed in
    pub unit: String,
    pub kind: MetricKind,
    pub larger_is_better: bool,
    /// Number of realized values
    pub count: usize,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    pub p1: Option<f64>,
    pub p5: Option<f64>,
    pub p10: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl MetricResult {
    /// Summarize `value` for `descriptor`, converting time metrics to `unit`
    pub fn from_value(
        descriptor: &MetricDescriptor,
        value: &MetricValue,
        unit: TimeUnit,
    ) -> Result<Self, MetricsError> {
        let (value, unit_label) = match descriptor.unit.time_unit() {
            Some(_) => (rescale(descriptor, value, unit)?, unit.short_name().to_string()),
            None => (value.clone(), descriptor.unit.to_string()),
        };

        let mut result = Self {
            tag: descriptor.tag.to_string(),
            header: descriptor.header.to_string(),
            unit: unit_label,
            kind: descriptor.kind,
            larger_is_better: descriptor.larger_is_better,
            count: 0,
            avg: None,
            min: None,
            max: None,
            std: None,
            p1: None,
            p5: None,
            p10: None,
            p25: None,
            p50: None,
            p75: None,
            p90: None,
            p95: None,
            p99: None,
        };

        match &value {
            MetricValue::Unset => {}
            MetricValue::Scalar(v) => {
                result.count = 1;
                result.avg = Some(*v);
            }
            MetricValue::Series(_) => {
                let mut sorted = value.realized();
                if sorted.is_empty() {
                    return Ok(result);
                }
                sorted.sort_by(|a, b| a.total_cmp(b));

                let n = sorted.len() as f64;
                let mean = sorted.iter().sum::<f64>() / n;
                let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

                result.count = sorted.len();
                result.avg = Some(mean);
                result.min = sorted.first().copied();
                result.max = sorted.last().copied();
                result.std = Some(variance.sqrt());
                result.p1 = Some(percentile(&sorted, 1.0));
                result.p5 = Some(percentile(&sorted, 5.0));
                result.p10 = Some(percentile(&sorted, 10.0));
                result.p25 = Some(percentile(&sorted, 25.0));
                result.p50 = Some(percentile(&sorted, 50.0));
                result.p75 = Some(percentile(&sorted, 75.0));
                result.p90 = Some(percentile(&sorted, 90.0));
                result.p95 = Some(percentile(&sorted, 95.0));
                result.p99 = Some(percentile(&sorted, 99.0));
            }
        }

        Ok(result)
    }

    /// Whether any value was computed
    pub fn has_value(&self) -> bool {
        self.count > 0
    }
}

/// Linear-interpolated percentile over sorted values
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let fraction = index - lower as f64;

    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Outcome of one metrics run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Records offered to the engine, errored ones included
    pub records_processed: u64,
    /// Records routed to the error summary
    pub records_errored: u64,
    /// Records dropped for failing the timing validity rule
    #[serde(default)]
    pub records_invalid: u64,
    /// Rejected (metric, record) pairs and failed summary values, per tag
    pub validation_failures: BTreeMap<String, u64>,
    /// Statistics in evaluation order
    pub results: Vec<MetricResult>,
    /// Raw values in nanoseconds / native units, per tag
    pub values: BTreeMap<String, MetricValue>,
    pub errors: ErrorSummaryReport,
    /// The run was cancelled before the record stream ended
    pub partial: bool,
}

impl MetricsSummary {
    pub fn get(&self, tag: &str) -> Option<&MetricResult> {
        self.results.iter().find(|r| r.tag == tag)
    }

    /// Raw accumulated value of `tag`
    pub fn value(&self, tag: &str) -> Option<&MetricValue> {
        self.values.get(tag)
    }

    /// Realized raw values of `tag`, empty slots omitted
    pub fn realized(&self, tag: &str) -> Vec<f64> {
        self.values.get(tag).map(MetricValue::realized).unwrap_or_default()
    }

    pub fn failures_for(&self, tag: &str) -> u64 {
        self.validation_failures.get(tag).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> u64 {
        self.validation_failures.values().sum()
    }
}
