// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

use crate::describe::MonitoringPolicy;

pub(crate) const DEFAULT_DATABASE_URL: &str = "sqlite:.data/batch-monitor.db?mode=rwc";

/// Batch monitor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL for the metadata store
    pub database_url: String,
    /// Tag gate applied to instance lifecycle events
    pub monitoring: MonitoringPolicy,
    /// Base URL of the instance describe service, if any
    pub describe_url: Option<String>,
    /// Timeout for a single describe request
    pub describe_timeout: Duration,
    /// Maximum number of envelopes processed concurrently
    pub max_concurrent_events: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `BATCH_MONITOR_DATABASE_URL`: SQLite connection string (default: `sqlite:.data/batch-monitor.db?mode=rwc`)
    /// - `BATCH_MONITOR_MONITORING_TAG`: Instance tag key (default: `RuntimeMonitoring`)
    /// - `BATCH_MONITOR_MONITORING_VALUE`: Required tag value (default: `enabled`)
    /// - `BATCH_MONITOR_DESCRIBE_URL`: Describe service base URL (default: unset)
    /// - `BATCH_MONITOR_DESCRIBE_TIMEOUT_MS`: Describe request timeout (default: 5000)
    /// - `BATCH_MONITOR_MAX_CONCURRENT_EVENTS`: Concurrency limit (default: 16)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("BATCH_MONITOR_DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let defaults = MonitoringPolicy::default();
        let tag_key =
            std::env::var("BATCH_MONITOR_MONITORING_TAG").unwrap_or(defaults.tag_key);
        if tag_key.is_empty() {
            return Err(ConfigError::Invalid(
                "BATCH_MONITOR_MONITORING_TAG",
                "must not be empty",
            ));
        }
        let tag_value =
            std::env::var("BATCH_MONITOR_MONITORING_VALUE").unwrap_or(defaults.tag_value);

        let describe_url = std::env::var("BATCH_MONITOR_DESCRIBE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let describe_timeout_ms: u64 = std::env::var("BATCH_MONITOR_DESCRIBE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "BATCH_MONITOR_DESCRIBE_TIMEOUT_MS",
                    "must be a number of milliseconds",
                )
            })?;

        let max_concurrent_events: usize = std::env::var("BATCH_MONITOR_MAX_CONCURRENT_EVENTS")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "BATCH_MONITOR_MAX_CONCURRENT_EVENTS",
                "must be a positive integer",
            ))?;

        Ok(Self {
            database_url,
            monitoring: MonitoringPolicy { tag_key, tag_value },
            describe_url,
            describe_timeout: Duration::from_millis(describe_timeout_ms),
            max_concurrent_events,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
