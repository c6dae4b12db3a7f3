//! Subcommand implementations

pub mod analyze;
pub mod metrics;
pub mod parse;

use anyhow::{Context, Result};
use std::path::Path;

use perf_lens::config::EngineConfig;

/// Engine configuration from `path`, or from the environment when absent
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => EngineConfig::from_env().context("Invalid PERF_LENS_* environment configuration"),
    }
}

/// Format an optional statistic, `N/A` when absent
pub fn fmt_stat(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "N/A".to_string())
}
