// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch Monitor Core - Lifecycle Event Merge Engine
//!
//! This crate turns container instance and batch job lifecycle events into
//! durable metadata records. Each event is classified, projected into a flat
//! set of fields, and merged into a shared key-value store with a
//! field-scoped partial update.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Event Bus                                │
//! │        (instance API-call audits, job state changes)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │ EventEnvelope
//!                                 ▼
//! ┌──────────────┐     ┌──────────────┐     ┌────────────────────────┐
//! │  classifier  │────►│   extract    │────►│        engine          │
//! │              │     │  (schemas)   │     │  (job state machine)   │
//! └──────────────┘     └──────────────┘     └────────────────────────┘
//!                                              │                 │
//!                                get/put/update│                 │describe
//!                                              ▼                 ▼
//!                                 ┌────────────────┐   ┌──────────────────┐
//!                                 │ MetadataStore  │   │ InstanceDescriber│
//!                                 │ (memory/sqlite)│   │  (static/http)   │
//!                                 └────────────────┘   └──────────────────┘
//! ```
//!
//! # Event Families
//!
//! | Family | Cases | Write |
//! |--------|-------|-------|
//! | Instance lifecycle | registered, deregistered | Tag-gated create-or-replace of the instance record |
//! | Job lifecycle | running | Partial update with platform-specific fields |
//! | Job lifecycle | succeeded, failed with task | Partial update of `status` and `stoppedAt` |
//! | Anything else | - | None |
//!
//! # Records
//!
//! | Kind | Partition key | Sort key |
//! |------|---------------|----------|
//! | Instance | container instance ARN + event name | `instance` |
//! | Job | job id | `job` |
//!
//! EC2 job records copy `os`, `arch` and the instance reference from the
//! registration record of the container instance they run on. If that record
//! does not exist the fields are left out.
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `BATCH_MONITOR_DATABASE_URL` | No | `sqlite:.data/batch-monitor.db?mode=rwc` | SQLite connection string |
//! | `BATCH_MONITOR_MONITORING_TAG` | No | `RuntimeMonitoring` | Instance tag that opts into tracking |
//! | `BATCH_MONITOR_MONITORING_VALUE` | No | `enabled` | Required tag value |
//! | `BATCH_MONITOR_DESCRIBE_URL` | No | - | Describe service base URL (`http` feature) |
//! | `BATCH_MONITOR_DESCRIBE_TIMEOUT_MS` | No | `5000` | Describe request timeout |
//! | `BATCH_MONITOR_MAX_CONCURRENT_EVENTS` | No | `16` | Envelopes processed concurrently |

#![deny(missing_docs)]

/// Event classification into lifecycle cases.
pub mod classifier;

/// Configuration loaded from environment variables.
pub mod config;

/// Compute instance description lookups and the monitoring tag gate.
pub mod describe;

/// Merge engine applying classified events to the store.
pub mod engine;

/// Inbound event envelopes.
pub mod envelope;

/// Error types with stable error codes.
pub mod error;

/// Typed path walker and extraction schemas.
pub mod extract;

/// Metadata store interface and backends.
pub mod persistence;

/// Metadata records, keys and partial updates.
pub mod record;

/// Job lifecycle state machine.
pub mod state_machine;

pub use classifier::{Classification, classify};
pub use config::Config;
pub use describe::{InstanceDescriber, InstanceDescription, MonitoringPolicy};
pub use engine::{BatchSummary, JobUpdateKind, MergeEngine, NoOpReason, Outcome};
pub use envelope::EventEnvelope;
pub use error::{Error, Result};
pub use persistence::{InMemoryStore, MetadataStore, SqliteStore};
pub use record::{MetadataAttributes, MetadataRecord, Platform, RecordKey, SortKey};
pub use state_machine::JobLifecycleState;
