//! Integration tests for the metrics engine
//!
//! Drive the public API end to end: discovery, graph resolution, the record
//! pass, the summary pass and the error summary.

use perf_lens::config::{EngineConfig, FailurePolicy};
use perf_lens::metrics::{
    consume, DerivedMetric, FoldMetric, Metric, MetricDescriptor, MetricKind, MetricRegistry,
    MetricTag, MetricUnit, MetricValue, MetricView, MetricsEngine, MetricsError, RecordFault,
    RegistryBuilder, RunOutcome, TimeUnit,
};
use perf_lens::records::{ErrorDetail, ParsedResponseRecord, RequestRecord, ResponseData};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Record with one response per timestamp, one token each
fn record(start: i64, responses: &[i64]) -> ParsedResponseRecord {
    ParsedResponseRecord::new(
        RequestRecord::new(serde_json::Value::Null, start),
        responses
            .iter()
            .map(|&ts| ResponseData::new(ts, Some(1)))
            .collect(),
    )
}

fn failed(error: ErrorDetail) -> ParsedResponseRecord {
    let mut record = record(10, &[]);
    record.request.fail(error);
    record
}

fn engine(metrics: &[&str]) -> MetricsEngine {
    let config = EngineConfig::default()
        .with_display_unit(TimeUnit::Nanoseconds)
        .with_metrics(metrics.iter().copied());
    MetricsEngine::new(MetricRegistry::global().unwrap(), config).unwrap()
}

#[test]
fn test_end_to_end_three_records() {
    let mut engine = engine(&["request_latency", "request_throughput"]);
    for (start, end) in [(10, 15), (20, 25), (30, 40)] {
        engine.process(&record(start, &[end])).unwrap();
    }
    let summary = engine.finalize(RunOutcome::Completed).unwrap();

    assert_eq!(summary.realized("request_latency"), vec![5.0, 5.0, 10.0]);
    assert_eq!(summary.realized("min_request_timestamp"), vec![10.0]);
    assert_eq!(summary.realized("max_response_timestamp"), vec![40.0]);
    assert_eq!(summary.realized("benchmark_duration"), vec![30.0]);
    assert_eq!(summary.realized("request_count"), vec![3.0]);
    assert_eq!(
        summary.realized("request_throughput"),
        vec![3.0 / (30.0 / 1e9)]
    );

    let latency = summary.get("request_latency").unwrap();
    assert_eq!(latency.unit, "ns");
    assert_eq!(latency.count, 3);
    assert_eq!(latency.max, Some(10.0));
    assert!(summary.errors.entries.is_empty());
    assert!(!summary.partial);
}

#[test]
fn test_response_less_record_does_not_widen_span() {
    let mut engine = engine(&["request_throughput"]);
    engine.process(&record(1, &[])).unwrap();
    for (start, end) in [(10, 15), (20, 25), (30, 40)] {
        engine.process(&record(start, &[end])).unwrap();
    }
    let summary = engine.finalize(RunOutcome::Completed).unwrap();

    assert_eq!(summary.records_invalid, 1);
    assert_eq!(summary.realized("request_count"), vec![3.0]);
    assert_eq!(summary.realized("min_request_timestamp"), vec![10.0]);
    assert_eq!(summary.realized("benchmark_duration"), vec![30.0]);
    assert_eq!(
        summary.realized("request_throughput"),
        vec![3.0 / (30.0 / 1e9)]
    );
}

#[test]
fn test_non_streaming_run_of_streaming_metrics_fails() {
    let config = EngineConfig::default()
        .with_streaming(false)
        .with_metrics(["inter_token_latency"]);
    let err = MetricsEngine::new(MetricRegistry::global().unwrap(), config).unwrap_err();
    assert!(matches!(err, MetricsError::NothingSelected(_)));
}

#[test]
fn test_streaming_metrics_end_to_end() {
    let mut engine = engine(&[
        "ttft",
        "ttst",
        "inter_token_latency",
        "output_token_throughput_per_user",
        "output_token_throughput",
    ]);
    // ttft 10, ttst 10, itl (40 - 20) / 2 = 10
    engine.process(&record(10, &[20, 30, 40])).unwrap();
    // single response: no ttst, no itl, no per-user throughput
    engine.process(&record(50, &[70])).unwrap();
    let summary = engine.finalize(RunOutcome::Completed).unwrap();

    assert_eq!(summary.realized("ttft"), vec![10.0, 20.0]);
    assert_eq!(summary.realized("ttst"), vec![10.0]);
    assert_eq!(summary.realized("inter_token_latency"), vec![10.0]);
    assert_eq!(
        summary.value("output_token_throughput_per_user"),
        Some(&MetricValue::Series(vec![Some(1e8), None]))
    );
    assert_eq!(summary.realized("total_output_tokens"), vec![4.0]);
    // 4 tokens over 60ns
    assert_eq!(
        summary.realized("output_token_throughput"),
        vec![4.0 / (60.0 / 1e9)]
    );
    assert_eq!(summary.failures_for("ttst"), 1);
    assert_eq!(summary.failures_for("inter_token_latency"), 1);
    assert_eq!(summary.failures_for("output_token_throughput_per_user"), 1);
}

#[test]
fn test_display_unit_applies_to_time_metrics() {
    let config = EngineConfig::default()
        .with_display_unit(TimeUnit::Milliseconds)
        .with_metrics(["request_latency", "request_count"]);
    let mut engine = MetricsEngine::new(MetricRegistry::global().unwrap(), config).unwrap();
    engine.process(&record(1_000_000, &[3_000_000])).unwrap();
    let summary = engine.finalize(RunOutcome::Completed).unwrap();

    let latency = summary.get("request_latency").unwrap();
    assert_eq!(latency.unit, "ms");
    assert_eq!(latency.avg, Some(2.0));
    assert_eq!(summary.get("request_count").unwrap().unit, "requests");
    // raw values stay in nanoseconds
    assert_eq!(summary.realized("request_latency"), vec![2_000_000.0]);
}

static A: MetricDescriptor = MetricDescriptor {
    tag: MetricTag::new("a"),
    header: "A",
    unit: MetricUnit::Dimensionless("requests"),
    kind: MetricKind::Record,
    larger_is_better: true,
    streaming_only: false,
    required: &[],
};

static B: MetricDescriptor = MetricDescriptor {
    tag: MetricTag::new("b"),
    header: "B",
    unit: MetricUnit::Dimensionless("requests"),
    kind: MetricKind::Metric,
    larger_is_better: true,
    streaming_only: false,
    required: &[MetricTag::new("a")],
};

static C: MetricDescriptor = MetricDescriptor {
    tag: MetricTag::new("c"),
    header: "C",
    unit: MetricUnit::Dimensionless("requests"),
    kind: MetricKind::Metric,
    larger_is_better: true,
    streaming_only: false,
    required: &[MetricTag::new("b")],
};

fn one(_: &ParsedResponseRecord) -> Result<f64, RecordFault> {
    Ok(1.0)
}

fn b_from_a(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    Ok(view.scalar(B.tag, A.tag)? + 10.0)
}

fn c_from_b(view: &MetricView<'_>) -> Result<f64, MetricsError> {
    Ok(view.scalar(C.tag, B.tag)? * 2.0)
}

fn build_a() -> Box<dyn Metric> {
    Box::new(FoldMetric::new(&A, one, |x, y| x + y))
}

fn build_b() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(&B, b_from_a))
}

fn build_c() -> Box<dyn Metric> {
    Box::new(DerivedMetric::new(&C, c_from_b))
}

fn register_reversed(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&C, build_c)?;
    builder.register(&B, build_b)?;
    builder.register(&A, build_a)?;
    Ok(())
}

fn register_a(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
    builder.register(&A, build_a)
}

#[test]
fn test_dependency_chain_order_ignores_registration_order() {
    let registry = MetricRegistry::discover_from(&[register_reversed]).unwrap();
    assert_eq!(
        registry.tags(),
        &[MetricTag::new("c"), MetricTag::new("b"), MetricTag::new("a")]
    );

    let mut engine = MetricsEngine::new(&registry, EngineConfig::default()).unwrap();
    let order: Vec<_> = engine
        .evaluation_order()
        .iter()
        .map(|d| d.tag.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    engine.process(&record(10, &[15])).unwrap();
    engine.process(&record(20, &[25])).unwrap();
    let summary = engine.finalize(RunOutcome::Completed).unwrap();
    assert_eq!(summary.realized("c"), vec![24.0]);
}

#[test]
fn test_duplicate_tag_rejected_at_discovery() {
    let err = MetricRegistry::discover_from(&[register_a, register_reversed]).unwrap_err();
    assert_eq!(err, MetricsError::DuplicateTag("a".to_string()));
    assert!(err.is_fatal());
}

#[test]
fn test_skip_policy_continues_abort_policy_stops() {
    let records = [record(10, &[15, 18]), record(20, &[25]), record(30, &[31, 35])];

    let mut skipping = engine(&["ttst"]);
    for r in &records {
        skipping.process(r).unwrap();
    }
    let summary = skipping.finalize(RunOutcome::Completed).unwrap();
    assert_eq!(summary.realized("ttst"), vec![3.0, 4.0]);
    assert_eq!(summary.failures_for("ttst"), 1);

    let config = EngineConfig::default()
        .with_metrics(["ttst"])
        .with_failure_policy(FailurePolicy::Abort);
    let mut aborting = MetricsEngine::new(MetricRegistry::global().unwrap(), config).unwrap();
    aborting.process(&records[0]).unwrap();
    let err = aborting.process(&records[1]).unwrap_err();
    assert_eq!(
        err.fault(),
        Some(&RecordFault::TooFewResponses {
            required: 2,
            actual: 1
        })
    );
}

#[test]
fn test_identical_failures_grouped() {
    let mut engine = engine(&["request_latency"]);
    engine
        .process(&failed(ErrorDetail::new(None, Some("Timeout"), "x")))
        .unwrap();
    engine.process(&record(10, &[15])).unwrap();
    engine
        .process(&failed(ErrorDetail::new(None, Some("Timeout"), "x")))
        .unwrap();
    engine
        .process(&failed(ErrorDetail::new(Some(500), Some("ServerError"), "x")))
        .unwrap();
    let summary = engine.finalize(RunOutcome::Completed).unwrap();

    assert_eq!(summary.errors.total, 3);
    assert_eq!(summary.errors.entries.len(), 2);
    assert_eq!(summary.errors.entries[0].count, 2);
    assert_eq!(
        summary.errors.entries[0].error,
        ErrorDetail::new(None, Some("Timeout"), "x")
    );
    assert_eq!(summary.realized("request_latency"), vec![5.0]);
    assert_eq!(summary.total_failures(), 0);
}

#[tokio::test]
async fn test_cancelled_run_is_partial() {
    let mut engine = engine(&["benchmark_duration"]);
    engine.process(&record(10, &[15])).unwrap();
    engine.process(&record(20, &[40])).unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(record(50, &[90])).await.unwrap();
    let shutdown = Arc::new(Notify::new());
    shutdown.notify_one();

    let summary = consume(engine, rx, shutdown).await.unwrap();
    assert!(summary.partial);
    assert!(summary.errors.was_cancelled);
    assert_eq!(summary.records_processed, 2);
    // summary pass still ran over the records seen
    assert_eq!(summary.realized("benchmark_duration"), vec![30.0]);
}

#[tokio::test]
async fn test_completed_run_over_channel() {
    let (tx, rx) = mpsc::channel(4);
    let handle = tokio::spawn(consume(
        engine(&["request_throughput"]),
        rx,
        Arc::new(Notify::new()),
    ));

    for (start, end) in [(10, 15), (20, 25), (30, 40)] {
        tx.send(record(start, &[end])).await.unwrap();
    }
    drop(tx);

    let summary = handle.await.unwrap().unwrap();
    assert!(!summary.partial);
    assert_eq!(summary.records_processed, 3);
    assert_eq!(
        summary.realized("request_throughput"),
        vec![3.0 / (30.0 / 1e9)]
    );
}
