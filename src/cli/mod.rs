//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use perf_lens::config::FailurePolicy;
use perf_lens::metrics::TimeUnit;

pub mod commands;

/// Inference benchmark metrics from recorded request timings
#[derive(Debug, Parser)]
#[command(name = "perf-lens", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON engine configuration file (defaults to PERF_LENS_* variables)
    #[arg(short, long, global = true, env = "PERF_LENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute metrics over a JSON Lines file of parsed response records
    Analyze(AnalyzeArgs),

    /// Parse a raw server-sent event chunk
    Parse(ParseArgs),

    /// List registered metrics
    Metrics,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Records file, one parsed response record per line
    pub input: PathBuf,

    /// Unit for time metrics (ns, us, ms, s)
    #[arg(short, long)]
    pub unit: Option<TimeUnit>,

    /// Responses were not streamed; drop streaming-only metrics
    #[arg(long)]
    pub no_streaming: bool,

    /// Comma-separated metric tags to compute
    #[arg(short, long, value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Reaction to records a metric cannot use (skip, abort)
    #[arg(long)]
    pub failure_policy: Option<FailurePolicy>,

    /// Channel capacity between the reader and the engine
    #[arg(long, default_value_t = 1024)]
    pub buffer: usize,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// File holding one raw chunk
    pub input: PathBuf,

    /// Receive timestamp attached to the message, in nanoseconds
    #[arg(short, long, default_value_t = 0)]
    pub timestamp: i64,
}
