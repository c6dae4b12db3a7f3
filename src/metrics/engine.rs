//! Metrics engine
//!
//! Drives a resolved [`DependencyGraph`] over a stream of parsed records.
//!
//! Records are fed one at a time, in arrival order, to every RECORD and BOTH
//! metric in evaluation order. When the stream ends (or is cancelled) the
//! METRIC pass runs once over the finalized values and a [`MetricsSummary`]
//! is produced.
//!
//! Records carrying an upstream error are not offered to any metric; they are
//! grouped in the [`ErrorSummary`] instead. Records failing the timing
//! validity rule are counted and dropped before the record pass. A metric
//! that rejects a record is skipped for that record only, unless the failure
//! policy is [`FailurePolicy::Abort`].

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::descriptor::{MetricDescriptor, MetricKind, MetricTag};
use super::error::MetricsError;
use super::graph::DependencyGraph;
use super::metric::{Metric, MetricView};
use super::registry::MetricRegistry;
use super::summary::{MetricResult, MetricsSummary};
use crate::config::{EngineConfig, FailurePolicy};
use crate::records::{ErrorSummary, ParsedResponseRecord};

/// How the record stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every record was delivered
    Completed,
    /// The run was stopped early
    Cancelled,
}

/// Per-run metric evaluation state
pub struct MetricsEngine {
    run_id: Uuid,
    config: EngineConfig,
    graph: DependencyGraph,
    metrics: Vec<Box<dyn Metric>>,
    failures: HashMap<MetricTag, u64>,
    errors: ErrorSummary,
    records_processed: u64,
    records_errored: u64,
    records_invalid: u64,
}

impl MetricsEngine {
    /// Build an engine for the metrics selected by `config`.
    ///
    /// With no explicit selection every registered metric is selected.
    /// Streaming-only metrics are left out of non-streaming runs.
    pub fn new(registry: &MetricRegistry, config: EngineConfig) -> Result<Self, MetricsError> {
        let selection = match &config.metrics {
            Some(names) => names
                .iter()
                .map(|name| {
                    registry
                        .lookup(name)
                        .map(|entry| entry.descriptor.tag)
                        .ok_or_else(|| MetricsError::UnknownMetric(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => registry.tags().to_vec(),
        };
        Self::with_selection(registry, &selection, config)
    }

    /// Build an engine for an explicit tag selection
    pub fn with_selection(
        registry: &MetricRegistry,
        selection: &[MetricTag],
        config: EngineConfig,
    ) -> Result<Self, MetricsError> {
        let (kept, dropped): (Vec<MetricTag>, Vec<MetricTag>) =
            selection.iter().copied().partition(|tag| {
                config.streaming
                    || !registry
                        .get(*tag)
                        .map(|e| e.descriptor.streaming_only)
                        .unwrap_or(false)
            });

        if !dropped.is_empty() {
            let dropped: Vec<String> = dropped.iter().map(|t| t.to_string()).collect();
            if kept.is_empty() {
                return Err(MetricsError::NothingSelected(dropped));
            }
            warn!(
                dropped = %dropped.join(","),
                "Streaming-only metrics left out of non-streaming run"
            );
        }
        let selection = kept;

        let graph = DependencyGraph::resolve(registry, &selection)?;
        let metrics = graph
            .order()
            .iter()
            .map(|descriptor| {
                registry
                    .get(descriptor.tag)
                    .map(|entry| (entry.constructor)())
                    .ok_or_else(|| MetricsError::UnknownMetric(descriptor.tag.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            metrics = metrics.len(),
            streaming = config.streaming,
            failure_policy = %config.failure_policy,
            "Metrics engine ready"
        );
        debug!(order = ?graph.tags(), "Evaluation order");

        Ok(Self {
            run_id,
            config,
            graph,
            metrics,
            failures: HashMap::new(),
            errors: ErrorSummary::new(),
            records_processed: 0,
            records_errored: 0,
            records_invalid: 0,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Descriptors in the order metrics are evaluated
    pub fn evaluation_order(&self) -> &[&'static MetricDescriptor] {
        self.graph.order()
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    pub fn error_summary(&self) -> &ErrorSummary {
        &self.errors
    }

    /// Failures tallied so far for `tag`
    pub fn failures(&self, tag: MetricTag) -> u64 {
        self.failures.get(&tag).copied().unwrap_or(0)
    }

    /// Feed one record to every per-record metric.
    ///
    /// Returns an error only for misconfigured metrics, or for a rejected
    /// record under [`FailurePolicy::Abort`].
    pub fn process(&mut self, record: &ParsedResponseRecord) -> Result<(), MetricsError> {
        self.records_processed += 1;

        if let Some(error) = &record.request.error {
            debug!(error = %error, "Record failed upstream, routing to error summary");
            self.errors.record(error);
            self.records_errored += 1;
            return Ok(());
        }

        if !record.is_valid() {
            debug!(
                start = record.start_perf_ns(),
                responses = record.responses.len(),
                "Record failed timing validity, skipping"
            );
            self.records_invalid += 1;
            return Ok(());
        }

        for index in 0..self.metrics.len() {
            let (finalized, rest) = self.metrics.split_at_mut(index);
            let metric = &mut rest[0];
            if !metric.descriptor().kind.consumes_records() {
                continue;
            }

            let view = MetricView::new(finalized);
            if let Err(err) = metric.update(Some(record), &view) {
                if err.is_fatal() {
                    return Err(err);
                }
                metric.skip_record();
                let tag = metric.tag();
                *self.failures.entry(tag).or_insert(0) += 1;
                debug!(tag = %tag, error = %err, "Metric skipped record");

                if self.config.failure_policy == FailurePolicy::Abort {
                    warn!(tag = %tag, "Aborting run on rejected record");
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Run the summary pass and build the summary.
    ///
    /// A cancelled run still evaluates every summary metric over the records
    /// seen so far; the result is marked partial.
    pub fn finalize(mut self, outcome: RunOutcome) -> Result<MetricsSummary, MetricsError> {
        for index in 0..self.metrics.len() {
            let (finalized, rest) = self.metrics.split_at_mut(index);
            let metric = &mut rest[0];
            if metric.descriptor().kind != MetricKind::Metric {
                continue;
            }

            let view = MetricView::new(finalized);
            if let Err(err) = metric.update(None, &view) {
                if err.is_fatal() {
                    return Err(err);
                }
                let tag = metric.tag();
                *self.failures.entry(tag).or_insert(0) += 1;
                debug!(tag = %tag, error = %err, "Summary metric left unset");
            }
        }

        let partial = outcome == RunOutcome::Cancelled;
        if partial {
            self.errors.mark_cancelled();
        }

        let mut results = Vec::with_capacity(self.metrics.len());
        let mut values = BTreeMap::new();
        for metric in &self.metrics {
            let descriptor = metric.descriptor();
            results.push(MetricResult::from_value(
                descriptor,
                metric.values(),
                self.config.display_unit,
            )?);
            values.insert(descriptor.tag.to_string(), metric.values().clone());
        }

        let validation_failures: BTreeMap<String, u64> = self
            .failures
            .iter()
            .map(|(tag, count)| (tag.to_string(), *count))
            .collect();

        info!(
            run_id = %self.run_id,
            records = self.records_processed,
            errored = self.records_errored,
            invalid = self.records_invalid,
            failures = validation_failures.values().sum::<u64>(),
            partial,
            "Metrics run finalized"
        );

        Ok(MetricsSummary {
            run_id: self.run_id,
            generated_at: Utc::now(),
            records_processed: self.records_processed,
            records_errored: self.records_errored,
            records_invalid: self.records_invalid,
            validation_failures,
            results,
            values,
            errors: self.errors.report(),
            partial,
        })
    }
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("run_id", &self.run_id)
            .field("order", &self.graph.tags())
            .field("records_processed", &self.records_processed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::fixtures::record;
    use crate::metrics::types::{latency, request, throughput};
    use crate::metrics::MetricValue;
    use crate::records::ErrorDetail;

    fn registry() -> MetricRegistry {
        MetricRegistry::discover().unwrap()
    }

    #[test]
    fn test_selection_pulls_dependencies() {
        let engine = MetricsEngine::with_selection(
            &registry(),
            &[throughput::REQUEST_THROUGHPUT],
            EngineConfig::default(),
        )
        .unwrap();

        let tags: Vec<_> = engine.evaluation_order().iter().map(|d| d.tag).collect();
        assert_eq!(tags.len(), 5);
        let pos = |tag: MetricTag| tags.iter().position(|t| *t == tag).unwrap();
        assert!(pos(request::BENCHMARK_DURATION) > pos(request::MIN_REQUEST_TIMESTAMP));
        assert!(pos(request::BENCHMARK_DURATION) > pos(request::MAX_RESPONSE_TIMESTAMP));
        assert!(pos(throughput::REQUEST_THROUGHPUT) > pos(request::BENCHMARK_DURATION));
        assert!(pos(throughput::REQUEST_THROUGHPUT) > pos(request::REQUEST_COUNT));
    }

    #[test]
    fn test_non_streaming_drops_streaming_metrics() {
        let config = EngineConfig::default().with_streaming(false);
        let engine = MetricsEngine::new(&registry(), config).unwrap();
        assert!(engine
            .evaluation_order()
            .iter()
            .all(|d| !d.streaming_only));
        assert!(engine
            .evaluation_order()
            .iter()
            .any(|d| d.tag == latency::REQUEST_LATENCY));
    }

    #[test]
    fn test_non_streaming_rejects_streaming_only_selection() {
        let config = EngineConfig::default()
            .with_streaming(false)
            .with_metrics(["ttft", "ttst"]);
        let err = MetricsEngine::new(&registry(), config).unwrap_err();
        assert_eq!(
            err,
            MetricsError::NothingSelected(vec!["ttft".to_string(), "ttst".to_string()])
        );
        assert!(err.is_fatal());

        let config = EngineConfig::default()
            .with_streaming(false)
            .with_metrics(["ttft", "request_latency"]);
        let engine = MetricsEngine::new(&registry(), config).unwrap();
        let tags: Vec<_> = engine.evaluation_order().iter().map(|d| d.tag).collect();
        assert_eq!(tags, vec![latency::REQUEST_LATENCY]);
    }

    #[test]
    fn test_unknown_selection_rejected() {
        let config = EngineConfig::default().with_metrics(["no_such_metric"]);
        let err = MetricsEngine::new(&registry(), config).unwrap_err();
        assert_eq!(err, MetricsError::UnknownMetric("no_such_metric".to_string()));
    }

    #[test]
    fn test_rejection_keeps_series_aligned() {
        let config = EngineConfig::default().with_metrics(["ttst", "request_latency"]);
        let mut engine = MetricsEngine::new(&registry(), config).unwrap();

        engine.process(&record(10, &[12, 15])).unwrap();
        engine.process(&record(10, &[20])).unwrap();
        engine.process(&record(10, &[11, 13])).unwrap();

        assert_eq!(engine.failures(latency::TTST), 1);
        let summary = engine.finalize(RunOutcome::Completed).unwrap();
        assert_eq!(
            summary.value("ttst"),
            Some(&MetricValue::Series(vec![Some(3.0), None, Some(2.0)]))
        );
        assert_eq!(summary.realized("request_latency"), vec![5.0, 10.0, 3.0]);
        assert_eq!(summary.failures_for("ttst"), 1);
        assert!(!summary.partial);
    }

    #[test]
    fn test_abort_policy_stops_on_rejection() {
        let config = EngineConfig::default()
            .with_metrics(["ttst"])
            .with_failure_policy(FailurePolicy::Abort);
        let mut engine = MetricsEngine::new(&registry(), config).unwrap();

        engine.process(&record(10, &[12, 15])).unwrap();
        let err = engine.process(&record(10, &[20])).unwrap_err();
        assert!(err.fault().is_some());
    }

    #[test]
    fn test_errored_records_bypass_metrics() {
        let config = EngineConfig::default().with_metrics(["request_latency"]);
        let mut engine = MetricsEngine::new(&registry(), config).unwrap();

        let mut failed = record(10, &[]);
        failed
            .request
            .fail(ErrorDetail::new(Some(500), Some("ServerError"), "boom"));
        engine.process(&failed).unwrap();
        engine.process(&record(10, &[15])).unwrap();

        assert_eq!(engine.failures(latency::REQUEST_LATENCY), 0);
        let summary = engine.finalize(RunOutcome::Completed).unwrap();
        assert_eq!(summary.records_processed, 2);
        assert_eq!(summary.records_errored, 1);
        assert_eq!(summary.errors.total, 1);
        assert_eq!(summary.realized("request_latency"), vec![5.0]);
    }

    #[test]
    fn test_invalid_records_skip_metric_pass() {
        let config = EngineConfig::default().with_metrics(["request_throughput"]);
        let mut engine = MetricsEngine::new(&registry(), config).unwrap();

        engine.process(&record(1, &[])).unwrap();
        engine.process(&record(10, &[15])).unwrap();
        engine.process(&record(20, &[25])).unwrap();
        engine.process(&record(30, &[40])).unwrap();

        let summary = engine.finalize(RunOutcome::Completed).unwrap();
        assert_eq!(summary.records_processed, 4);
        assert_eq!(summary.records_invalid, 1);
        assert_eq!(summary.total_failures(), 0);
        assert_eq!(summary.realized("request_count"), vec![3.0]);
        assert_eq!(summary.realized("min_request_timestamp"), vec![10.0]);
        assert_eq!(summary.realized("benchmark_duration"), vec![30.0]);
    }

    #[test]
    fn test_missing_summary_dependency_is_tallied() {
        let config = EngineConfig::default().with_metrics(["benchmark_duration"]);
        let engine = MetricsEngine::new(&registry(), config).unwrap();

        let summary = engine.finalize(RunOutcome::Completed).unwrap();
        assert_eq!(summary.failures_for("benchmark_duration"), 1);
        assert_eq!(summary.value("benchmark_duration"), Some(&MetricValue::Unset));
    }
}
