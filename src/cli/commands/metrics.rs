//! Metrics command implementation
//!
//! Lists every registered metric kind.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use perf_lens::metrics::{MetricDescriptor, MetricRegistry};

/// Exported view of a descriptor
#[derive(Debug, Serialize)]
struct MetricListing {
    tag: String,
    header: &'static str,
    kind: String,
    unit: String,
    larger_is_better: bool,
    streaming_only: bool,
    required: Vec<String>,
}

impl From<&MetricDescriptor> for MetricListing {
    fn from(descriptor: &MetricDescriptor) -> Self {
        Self {
            tag: descriptor.tag.to_string(),
            header: descriptor.header,
            kind: descriptor.kind.to_string(),
            unit: descriptor.unit.to_string(),
            larger_is_better: descriptor.larger_is_better,
            streaming_only: descriptor.streaming_only,
            required: descriptor.required.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Execute the metrics command
pub fn execute(json_output: bool) -> Result<()> {
    let registry = MetricRegistry::global().context("Metric discovery failed")?;
    let listings: Vec<MetricListing> = registry.descriptors().map(MetricListing::from).collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    println!();
    println!("{}", "Registered Metrics".bright_cyan().bold().underline());
    println!();
    println!(
        "{:34} {:8} {:16} {:10} {}",
        "Tag".bright_white().bold(),
        "Class".bright_white().bold(),
        "Unit".bright_white().bold(),
        "Streaming".bright_white().bold(),
        "Requires".bright_white().bold()
    );
    println!("{}", "-".repeat(110));

    for listing in &listings {
        println!(
            "{:34} {:8} {:16} {:10} {}",
            listing.tag,
            listing.kind,
            listing.unit,
            if listing.streaming_only { "yes" } else { "no" },
            listing.required.join(", ")
        );
    }

    println!();
    println!("{} {} metrics", "=>".bright_cyan(), listings.len());
    Ok(())
}
