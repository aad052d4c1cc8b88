//! Configuration management for the rate limiter service.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::ratelimit::PolicySet;

/// Prefix for environment variable overrides, e.g. `RATELIMIT__SWEEP__INTERVAL_SECS`.
pub const ENV_PREFIX: &str = "RATELIMIT";

/// Main configuration for the rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Default log filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Expiry sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Policies layered over the built-in defaults, read from the
    /// top-level `policies` key
    #[serde(flatten)]
    pub policies: PolicySet,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            sweep: SweepConfig::default(),
            policies: PolicySet::empty(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Expiry sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Whether the background sweeper runs
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

/// Scalar settings that may be overridden from the environment.
///
/// Policies are not included: environment keys are case-folded, while policy
/// names are matched exactly.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    log_level: Option<String>,
    log_format: Option<LogFormat>,
    #[serde(default)]
    sweep: SweepOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct SweepOverrides {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from an optional YAML file with `RATELIMIT__*`
    /// environment overrides applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let overrides: EnvOverrides = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply(overrides);
        Ok(config)
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.log_format = log_format;
        }
        if let Some(enabled) = overrides.sweep.enabled {
            self.sweep.enabled = enabled;
        }
        if let Some(interval_secs) = overrides.sweep.interval_secs {
            self.sweep.interval_secs = interval_secs;
        }
    }

    /// The built-in policies with the configured ones layered on top.
    pub fn policy_set(&self) -> PolicySet {
        let mut policies = PolicySet::default();
        policies.merge(self.policies.clone());
        policies
    }
}
