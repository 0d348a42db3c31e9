// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Bus server address (`host:port` or full URL)
    pub server: String,
    /// Connection name announced to the bus server
    pub client_name: String,
    /// Endpoint handed to the worker; defaults to `server`
    pub worker_endpoint: Option<String>,
    /// Public subject on which jobs arrive
    pub subject: String,
    pub worker: WorkerConfig,
    pub timing: TimingConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            server: "demo.nats.io".to_string(),
            client_name: "dispatcher".to_string(),
            worker_endpoint: None,
            subject: "denolet".to_string(),
            worker: WorkerConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// How to launch the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Program followed by its leading arguments. The bus endpoint and the
    /// instance id are appended after these.
    pub command: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: ["deno", "run", "-A", "service.ts"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Timeouts and intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Overall deadline for a freshly spawned worker to answer its ping
    #[serde(with = "humantime_serde")]
    pub readiness_timeout: Duration,
    /// Timeout of a single ping request
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Pause between pings that found no responder
    #[serde(with = "humantime_serde")]
    pub probe_backoff: Duration,
    /// Inactivity after which a running worker is stopped
    #[serde(with = "humantime_serde")]
    pub idle_threshold: Duration,
    /// How often the idle monitor checks
    #[serde(with = "humantime_serde")]
    pub idle_check_interval: Duration,
    /// How long teardown waits for buffered worker output before dropping it
    #[serde(with = "humantime_serde")]
    pub log_drain_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(1),
            probe_backoff: Duration::from_millis(100),
            idle_threshold: Duration::from_secs(10),
            idle_check_interval: Duration::from_secs(10),
            log_drain_timeout: Duration::from_secs(1),
        }
    }
}

impl DispatcherConfig {
    /// Read and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("server must not be empty".into()));
        }
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::Invalid("client_name must not be empty".into()));
        }
        if self.subject.trim().is_empty() {
            return Err(ConfigError::Invalid("subject must not be empty".into()));
        }
        if self.worker.command.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("worker command must name a program".into()));
        }

        let t = &self.timing;
        let durations = [
            ("readiness_timeout", t.readiness_timeout),
            ("probe_timeout", t.probe_timeout),
            ("probe_backoff", t.probe_backoff),
            ("idle_threshold", t.idle_threshold),
            ("idle_check_interval", t.idle_check_interval),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }
        Ok(())
    }

    /// Endpoint string passed to the worker as its first trailing argument
    pub fn worker_endpoint(&self) -> &str {
        self.worker_endpoint.as_deref().unwrap_or(&self.server)
    }

    /// URL used to connect to the bus
    pub fn connect_url(&self) -> String {
        if self.server.contains("://") {
            self.server.clone()
        } else {
            format!("nats://{}", self.server)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
