//! Engine configuration
//!
//! Settings for a metrics run: which metrics to compute, how to react to
//! records a metric cannot use, and the unit summaries are reported in.
//! Loaded from environment variables with defaults, or from a JSON file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::metrics::TimeUnit;

/// Environment variables read by [`EngineConfig::from_env`]
pub const ENV_STREAMING: &str = "PERF_LENS_STREAMING";
pub const ENV_FAILURE_POLICY: &str = "PERF_LENS_FAILURE_POLICY";
pub const ENV_METRICS: &str = "PERF_LENS_METRICS";
pub const ENV_DISPLAY_UNIT: &str = "PERF_LENS_DISPLAY_UNIT";

/// What to do when a metric rejects a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip that metric for that record, count it, keep going
    #[default]
    Skip,
    /// Stop processing at the first rejection
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(ConfigError::InvalidValue {
                var: ENV_FAILURE_POLICY.to_string(),
                expected: "skip|abort".to_string(),
                actual: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Skip => f.write_str("skip"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

/// Metrics engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Responses are streamed; when false, streaming-only metrics are dropped
    pub streaming: bool,
    /// Reaction to rejected records
    pub failure_policy: FailurePolicy,
    /// Explicit metric selection; `None` selects every registered metric
    pub metrics: Option<Vec<String>>,
    /// Unit used for time metrics in summaries
    pub display_unit: TimeUnit,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            failure_policy: FailurePolicy::Skip,
            metrics: None,
            display_unit: TimeUnit::Milliseconds,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_STREAMING) {
            config.streaming = parse_bool(ENV_STREAMING, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_FAILURE_POLICY) {
            config.failure_policy = value.parse()?;
        }
        if let Ok(value) = std::env::var(ENV_METRICS) {
            config.metrics = Some(parse_list(&value));
        }
        if let Ok(value) = std::env::var(ENV_DISPLAY_UNIT) {
            config.display_unit = value.parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_DISPLAY_UNIT.to_string(),
                expected: "ns|us|ms|s".to_string(),
                actual: value.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Select only the given metrics
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_display_unit(mut self, unit: TimeUnit) -> Self {
        self.display_unit = unit;
        self
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(metrics) = &self.metrics {
            if metrics.is_empty() {
                return Err(ConfigError::EmptySelection);
            }
            if let Some(blank) = metrics.iter().find(|m| m.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    var: ENV_METRICS.to_string(),
                    expected: "comma-separated metric tags".to_string(),
                    actual: blank.clone(),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            expected: "true|false".to_string(),
            actual: other.to_string(),
        }),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: expected {expected}, got {actual}")]
    InvalidValue {
        var: String,
        expected: String,
        actual: String,
    },

    #[error("Metric selection is empty")]
    EmptySelection,

    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}
