// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for batch-monitor-core integration tests.
//!
//! Provides event fixtures and a TestContext wiring an engine to a store.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};

use batch_monitor_core::describe::{InstanceDescription, MonitoringPolicy, StaticInstanceDescriber};
use batch_monitor_core::engine::MergeEngine;
use batch_monitor_core::envelope::EventEnvelope;
use batch_monitor_core::persistence::{InMemoryStore, MetadataStore, SqliteStore};

pub const CLUSTER: &str = "batch-cluster";
pub const INSTANCE_ARN: &str =
    "arn:aws:ecs:eu-west-1:123456789012:container-instance/batch-cluster/4f6c1a";
pub const INSTANCE_ID: &str = "i-0123456789abcdef0";
pub const JOB_ID: &str = "8b1c0f2e-6a47-4d1b-9d3e-3f0c2a7b9e11";
pub const TASK_ARN: &str = "arn:aws:ecs:eu-west-1:123456789012:task/batch-cluster/77aa";

/// Engine plus the concrete store behind it.
pub struct TestContext<S> {
    pub store: Arc<S>,
    pub describer: Arc<StaticInstanceDescriber>,
    pub engine: MergeEngine,
    _dir: Option<tempfile::TempDir>,
}

impl TestContext<InMemoryStore> {
    /// Engine over an in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::build(store, None)
    }
}

impl TestContext<SqliteStore> {
    /// Engine over a SQLite store in a temporary directory.
    pub async fn sqlite() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = SqliteStore::from_path(dir.path().join("metadata.db"))
            .await
            .expect("open sqlite store");
        Self::build(Arc::new(store), Some(dir))
    }
}

impl<S: MetadataStore + 'static> TestContext<S> {
    fn build(store: Arc<S>, dir: Option<tempfile::TempDir>) -> Self {
        let describer = Arc::new(StaticInstanceDescriber::new());
        let engine = MergeEngine::new(
            store.clone(),
            describer.clone(),
            MonitoringPolicy::default(),
        );
        Self {
            store,
            describer,
            engine,
            _dir: dir,
        }
    }

    /// Make `instance_id` known to the describer with the given tags.
    pub async fn describe(&self, instance_id: &str, tags: &[(&str, &str)]) {
        self.describer
            .insert(InstanceDescription {
                instance_id: instance_id.to_string(),
                launch_time: "2025-03-01T09:58:00Z".parse().ok(),
                tags: tags
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
            .await;
    }

    /// Make `instance_id` known and tagged for monitoring.
    pub async fn describe_monitored(&self, instance_id: &str) {
        self.describe(instance_id, &[("RuntimeMonitoring", "enabled")])
            .await;
    }
}

pub fn envelope(value: Value) -> EventEnvelope {
    serde_json::from_value(value).expect("valid envelope")
}

/// Container instance API-call audit event.
pub fn instance_event(event_name: &str, arn: &str, instance_id: &str) -> EventEnvelope {
    envelope(json!({
        "version": "0",
        "source": "aws.ecs",
        "detail-type": "AWS API Call via CloudTrail",
        "time": "2025-03-01T10:00:00Z",
        "region": "eu-west-1",
        "detail": {
            "eventName": event_name,
            "eventTime": "2025-03-01T10:00:00Z",
            "requestParameters": {"cluster": CLUSTER},
            "responseElements": {
                "containerInstance": {
                    "containerInstanceArn": arn,
                    "ec2InstanceId": instance_id,
                    "attributes": [
                        {"name": "ecs.availability-zone", "value": "eu-west-1a"},
                        {"name": "ecs.instance-type", "value": "m5.large"},
                        {"name": "ecs.ami-id", "value": "ami-0abcdef"},
                        {"name": "ecs.cpu-architecture", "value": "x86_64"},
                        {"name": "ecs.os-type", "value": "linux"}
                    ],
                    "registeredResources": [
                        {"name": "CPU", "type": "INTEGER", "integerValue": 2048},
                        {"name": "MEMORY", "type": "INTEGER", "integerValue": 7680}
                    ]
                }
            }
        }
    }))
}

pub fn registration_event(arn: &str, instance_id: &str) -> EventEnvelope {
    instance_event("RegisterContainerInstance", arn, instance_id)
}

pub fn deregistration_event(arn: &str, instance_id: &str) -> EventEnvelope {
    instance_event("DeregisterContainerInstance", arn, instance_id)
}

/// Batch job state change with a placed task.
pub fn job_event(job_id: &str, status: &str, capability: &str) -> EventEnvelope {
    let mut container = json!({
        "taskArn": TASK_ARN,
        "logStreamName": "batch-job/default/77aa",
        "resourceRequirements": [
            {"type": "VCPU", "value": "2"},
            {"type": "MEMORY", "value": "4096"}
        ]
    });
    if capability == "FARGATE" {
        container["runtimePlatform"] = json!({
            "operatingSystemFamily": "LINUX",
            "cpuArchitecture": "ARM64"
        });
    } else {
        container["containerInstanceArn"] = json!(INSTANCE_ARN);
    }

    envelope(json!({
        "version": "0",
        "source": "aws.batch",
        "detail-type": "Batch Job State Change",
        "time": "2025-03-01T10:05:00Z",
        "region": "eu-west-1",
        "detail": {
            "jobName": "nightly-report",
            "jobId": job_id,
            "jobQueue": "arn:aws:batch:eu-west-1:123456789012:job-queue/default",
            "jobDefinition": "arn:aws:batch:eu-west-1:123456789012:job-definition/report:3",
            "status": status,
            "createdAt": 1740823200000i64,
            "startedAt": 1740823500000i64,
            "stoppedAt": 1740824100000i64,
            "platformCapabilities": [capability],
            "container": container
        }
    }))
}

/// The same job event without a placed task.
pub fn job_event_without_task(job_id: &str, status: &str) -> EventEnvelope {
    let mut event = job_event(job_id, status, "EC2");
    if let Some(container) = event.detail.get_mut("container").and_then(Value::as_object_mut) {
        container.remove("taskArn");
    }
    event
}

/// Mark an envelope as an errored API call.
pub fn with_error_code(mut event: EventEnvelope, code: &str) -> EventEnvelope {
    event.detail["errorCode"] = json!(code);
    event
}
