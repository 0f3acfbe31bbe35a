// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for batch-monitor-core.
//!
//! Event-shape problems never surface here: unclassifiable or malformed
//! envelopes resolve to a no-op outcome. These errors cover the
//! infrastructure the engine talks to (the metadata store and the instance
//! describer) and startup configuration. They are returned to the hosting
//! substrate, which owns retries.

use thiserror::Error;

/// Result type using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Metadata store failures.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A backend operation failed.
    #[error("Store error during '{operation}': {details}")]
    Backend {
        /// The operation that failed (get_item, put_item, update_item, ...).
        operation: String,
        /// Error details.
        details: String,
    },

    /// A stored field could not be encoded or decoded.
    #[error("Invalid stored field '{field}': {details}")]
    InvalidField {
        /// The attribute name.
        field: String,
        /// Error details.
        details: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

/// Instance describer failures.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DescribeError {
    /// The describe request could not be completed.
    #[error("Failed to describe instance '{instance_id}': {reason}")]
    Request {
        /// The compute instance id.
        instance_id: String,
        /// The reason for failure.
        reason: String,
    },

    /// The describe response could not be decoded.
    #[error("Invalid describe response for instance '{instance_id}': {reason}")]
    InvalidResponse {
        /// The compute instance id.
        instance_id: String,
        /// The reason for failure.
        reason: String,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Metadata store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Instance describe lookup failed.
    #[error(transparent)]
    Describe(#[from] DescribeError),
}

impl Error {
    /// Get the stable error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(StoreError::Backend { .. }) => "STORE_ERROR",
            Self::Store(StoreError::InvalidField { .. }) => "STORE_INVALID_FIELD",
            Self::Describe(DescribeError::Request { .. }) => "DESCRIBE_FAILED",
            Self::Describe(DescribeError::InvalidResponse { .. }) => "DESCRIBE_INVALID_RESPONSE",
        }
    }

    /// Whether retrying the same event may succeed.
    ///
    /// Store and describe failures are infrastructure faults; configuration
    /// and decoding problems will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Backend { .. }) | Self::Describe(DescribeError::Request { .. })
        )
    }
}
