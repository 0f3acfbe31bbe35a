// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch Monitor Core - local event host
//!
//! Reads newline-delimited event envelopes from stdin, runs them through the
//! merge engine against a SQLite store and logs a summary.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use batch_monitor_core::config::Config;
use batch_monitor_core::describe::{InstanceDescriber, StaticInstanceDescriber};
use batch_monitor_core::engine::{BatchSummary, MergeEngine};
use batch_monitor_core::envelope::EventEnvelope;
use batch_monitor_core::persistence::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("batch_monitor_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Batch Monitor Core");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        database_url = %config.database_url,
        tag = %config.monitoring.tag_key,
        describe_url = ?config.describe_url,
        max_concurrent_events = config.max_concurrent_events,
        "Configuration loaded"
    );

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    info!("Metadata store ready");

    let describer = build_describer(&config)?;
    let engine = MergeEngine::new(store, describer, config.monitoring.clone());

    let mut envelopes = Vec::new();
    let mut skipped = 0usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match EventEnvelope::from_json(&line) {
            Ok(envelope) => envelopes.push(envelope),
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping malformed envelope");
                skipped += 1;
            }
        }
    }

    info!(count = envelopes.len(), skipped, "Processing envelopes");

    let results = engine
        .process_all(envelopes, config.max_concurrent_events)
        .await;

    for err in results.iter().filter_map(|result| result.as_ref().err()) {
        error!(
            code = err.error_code(),
            retryable = err.is_retryable(),
            "Event failed: {}",
            err
        );
    }

    let summary = BatchSummary::from_results(&results);
    info!(
        processed = summary.processed,
        written = summary.written,
        no_op = summary.no_op,
        failed = summary.failed,
        skipped,
        "Batch complete"
    );

    Ok(())
}

#[cfg(feature = "http")]
fn build_describer(config: &Config) -> Result<Arc<dyn InstanceDescriber>> {
    use batch_monitor_core::describe::HttpInstanceDescriber;

    match &config.describe_url {
        Some(url) => {
            info!(url = %url, "Using HTTP instance describer");
            Ok(Arc::new(HttpInstanceDescriber::new(
                url.clone(),
                config.describe_timeout,
            )?))
        }
        None => Ok(Arc::new(StaticInstanceDescriber::new())),
    }
}

#[cfg(not(feature = "http"))]
fn build_describer(config: &Config) -> Result<Arc<dyn InstanceDescriber>> {
    if config.describe_url.is_some() {
        warn!("BATCH_MONITOR_DESCRIBE_URL is set but the http feature is disabled");
    }
    Ok(Arc::new(StaticInstanceDescriber::new()))
}
