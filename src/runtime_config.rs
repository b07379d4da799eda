//! # Runtime Configuration Module
//!
//! Configuration for dispatch policy and the worker pool, loaded from an
//! optional TOML file and then overridden by environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `JAXR_MAX_LOCATOR_DEPTH` | `max_locator_depth` | `64` |
//! | `JAXR_CONTINUED_SEARCH` | `continued_search` | `false` |
//! | `JAXR_DEFAULT_PRIORITY` | `default_priority` | `0.5` |
//! | `JAXR_SYSTEM_PRIORITY` | `system_priority` | `0.1` |
//! | `JAXR_HANDLER_WORKERS` | `worker_pool.num_workers` | `4` |
//! | `JAXR_HANDLER_QUEUE_BOUND` | `worker_pool.queue_bound` | `1024` |
//! | `JAXR_BACKPRESSURE_MODE` | `worker_pool.backpressure_mode` | `block` |
//! | `JAXR_BACKPRESSURE_TIMEOUT_MS` | `worker_pool.backpressure_timeout_ms` | `50` |
//! | `JAXR_STACK_SIZE` | `worker_pool.stack_size` | `0x10000` |
//!
//! `JAXR_STACK_SIZE` accepts decimal or `0x`-prefixed hexadecimal.
//!
//! ## Example
//!
//! ```toml
//! max_locator_depth = 16
//! continued_search = true
//!
//! [worker_pool]
//! num_workers = 8
//! backpressure_mode = "shed"
//! ```

use crate::worker_pool::{BackpressureMode, WorkerPoolConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {var}")]
    Env { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum number of chained sub-resource locators per request
    pub max_locator_depth: usize,
    /// Try every matching resource in order instead of only the best one
    pub continued_search: bool,
    /// Priority for user resources and providers registered without one
    pub default_priority: f64,
    /// Priority for built-in providers
    pub system_priority: f64,
    /// Worker pool settings
    pub worker_pool: WorkerPoolConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_locator_depth: 64,
            continued_search: false,
            default_priority: 0.5,
            system_priority: 0.1,
            worker_pool: WorkerPoolConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `JAXR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Load an optional file, apply the environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("JAXR_MAX_LOCATOR_DEPTH") {
            self.max_locator_depth = parse_var("JAXR_MAX_LOCATOR_DEPTH", &v)?;
        }
        if let Some(v) = lookup("JAXR_CONTINUED_SEARCH") {
            self.continued_search = parse_var("JAXR_CONTINUED_SEARCH", &v)?;
        }
        if let Some(v) = lookup("JAXR_DEFAULT_PRIORITY") {
            self.default_priority = parse_var("JAXR_DEFAULT_PRIORITY", &v)?;
        }
        if let Some(v) = lookup("JAXR_SYSTEM_PRIORITY") {
            self.system_priority = parse_var("JAXR_SYSTEM_PRIORITY", &v)?;
        }
        if let Some(v) = lookup("JAXR_HANDLER_WORKERS") {
            self.worker_pool.num_workers = parse_var("JAXR_HANDLER_WORKERS", &v)?;
        }
        if let Some(v) = lookup("JAXR_HANDLER_QUEUE_BOUND") {
            self.worker_pool.queue_bound = parse_var("JAXR_HANDLER_QUEUE_BOUND", &v)?;
        }
        if let Some(v) = lookup("JAXR_BACKPRESSURE_MODE") {
            self.worker_pool.backpressure_mode =
                BackpressureMode::from_str(&v).ok_or(ConfigError::Env {
                    var: "JAXR_BACKPRESSURE_MODE",
                    value: v,
                })?;
        }
        if let Some(v) = lookup("JAXR_BACKPRESSURE_TIMEOUT_MS") {
            self.worker_pool.backpressure_timeout_ms =
                parse_var("JAXR_BACKPRESSURE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("JAXR_STACK_SIZE") {
            let parsed = match v.strip_prefix("0x") {
                Some(hex) => usize::from_str_radix(hex, 16).ok(),
                None => v.parse().ok(),
            };
            self.worker_pool.stack_size = parsed.ok_or(ConfigError::Env {
                var: "JAXR_STACK_SIZE",
                value: v,
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_locator_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_locator_depth must be at least 1".to_string(),
            ));
        }
        if !self.default_priority.is_finite() || !self.system_priority.is_finite() {
            return Err(ConfigError::Invalid(
                "priorities must be finite numbers".to_string(),
            ));
        }
        if self.worker_pool.num_workers == 0 {
            return Err(ConfigError::Invalid(
                "worker_pool.num_workers must be at least 1".to_string(),
            ));
        }
        if self.worker_pool.queue_bound == 0 {
            return Err(ConfigError::Invalid(
                "worker_pool.queue_bound must be at least 1".to_string(),
            ));
        }
        if self.worker_pool.stack_size == 0 {
            return Err(ConfigError::Invalid(
                "worker_pool.stack_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
