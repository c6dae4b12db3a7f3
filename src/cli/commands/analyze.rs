//! Analyze command implementation
//!
//! Feeds a JSON Lines file of parsed response records through the metrics
//! engine and prints the run summary.
//!
//! ```bash
//! perf-lens analyze records.jsonl [--unit ms] [--no-streaming] [--metrics a,b] [--json]
//! ```
//!
//! Ctrl-C stops reading and reports the records seen so far as a partial run.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use perf_lens::config::EngineConfig;
use perf_lens::metrics::{consume, MetricRegistry, MetricsEngine, MetricsSummary};
use perf_lens::records::ParsedResponseRecord;

use super::{fmt_stat, load_config};
use crate::cli::AnalyzeArgs;

/// Execute the analyze command
pub async fn execute(args: &AnalyzeArgs, config_path: Option<&Path>, json_output: bool) -> Result<()> {
    info!(input = %args.input.display(), "Starting analysis");

    let config = build_config(args, load_config(config_path)?)?;
    let registry = MetricRegistry::global().context("Metric discovery failed")?;
    let engine = MetricsEngine::new(registry, config).context("Failed to build metrics engine")?;

    let (tx, rx) = mpsc::channel(args.buffer.max(1));
    let shutdown = Arc::new(Notify::new());
    let consumer = tokio::spawn(consume(engine, rx, shutdown.clone()));

    let signal = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received");
                shutdown.notify_one();
            }
        })
    };

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open records file: {}", args.input.display()))?;
    let mut sent = 0u64;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(&line)
            .with_context(|| format!("Invalid record on line {}", index + 1))?;
        if tx.send(record).await.is_err() {
            // Consumer stopped early; its result says why
            break;
        }
        sent += 1;
    }
    drop(tx);
    info!(records = sent, "Finished reading records");

    let summary = consumer.await.context("Record consumer panicked")??;
    signal.abort();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Apply command-line overrides to the loaded configuration
fn build_config(args: &AnalyzeArgs, mut config: EngineConfig) -> Result<EngineConfig> {
    if let Some(unit) = args.unit {
        config.display_unit = unit;
    }
    if args.no_streaming {
        config.streaming = false;
    }
    if !args.metrics.is_empty() {
        config.metrics = Some(args.metrics.clone());
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}

fn parse_record(line: &str) -> Result<ParsedResponseRecord> {
    serde_json::from_str(line).context("Expected a parsed response record object")
}

fn print_summary(summary: &MetricsSummary) {
    println!();
    println!(
        "{}",
        "Metrics Summary".bright_cyan().bold().underline()
    );
    println!();

    println!(
        "{:34} {:>16} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Metric".bright_white().bold(),
        "Unit".bright_white().bold(),
        "Avg".bright_white().bold(),
        "Min".bright_white().bold(),
        "Max".bright_white().bold(),
        "P50".bright_white().bold(),
        "P90".bright_white().bold(),
        "P99".bright_white().bold()
    );
    println!("{}", "-".repeat(130));

    for result in &summary.results {
        let header = if result.has_value() {
            result.header.normal()
        } else {
            result.header.dimmed()
        };
        println!(
            "{:34} {:>16} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            header,
            result.unit,
            fmt_stat(result.avg),
            fmt_stat(result.min),
            fmt_stat(result.max),
            fmt_stat(result.p50),
            fmt_stat(result.p90),
            fmt_stat(result.p99)
        );
    }
    println!();

    println!(
        "{} Records: {} | {} | {} | {}",
        "=>".bright_cyan(),
        format!("{} processed", summary.records_processed).bright_white(),
        format!("{} errored", summary.records_errored).bright_red(),
        format!("{} invalid", summary.records_invalid).yellow(),
        format!("{} skipped values", summary.total_failures()).yellow()
    );

    if !summary.validation_failures.is_empty() {
        println!();
        println!("{}", "Skipped values by metric:".bright_white().bold());
        for (tag, count) in &summary.validation_failures {
            println!("  {:34} {}", tag, count);
        }
    }

    if !summary.errors.entries.is_empty() {
        println!();
        println!("{}", "Request errors:".bright_red().bold());
        for entry in &summary.errors.entries {
            println!("  {:>6}x  {}", entry.count, entry.error);
        }
    }

    if summary.partial {
        println!();
        println!(
            "{} Run was cancelled; results cover the records seen so far",
            "!".bright_yellow().bold()
        );
    }

    println!();
    println!("{} Run {} complete", "✓".bright_green().bold(), summary.run_id);
}
