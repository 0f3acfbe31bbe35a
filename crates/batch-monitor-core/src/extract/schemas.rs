// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Extraction schemas for instance and job lifecycle events, and the typed
//! views the engine reads them through.

use serde_json::Value;

use super::{ExtractedFields, ExtractionRule, ExtractionSchema, Selector};

const INSTANCE_ATTRIBUTES: &[&str] = &[
    "detail",
    "responseElements",
    "containerInstance",
    "attributes",
];
const REGISTERED_RESOURCES: &[&str] = &[
    "detail",
    "responseElements",
    "containerInstance",
    "registeredResources",
];
const RESOURCE_REQUIREMENTS: &[&str] = &["detail", "container", "resourceRequirements"];

const fn attribute(target: &'static str, name: &'static str) -> ExtractionRule {
    ExtractionRule {
        target,
        selector: Selector::FirstMatch {
            list: INSTANCE_ATTRIBUTES,
            key_field: "name",
            key_value: name,
            value_field: "value",
        },
    }
}

const fn registered_resource(target: &'static str, name: &'static str) -> ExtractionRule {
    ExtractionRule {
        target,
        selector: Selector::FirstMatch {
            list: REGISTERED_RESOURCES,
            key_field: "name",
            key_value: name,
            value_field: "integerValue",
        },
    }
}

const fn requirement(target: &'static str, kind: &'static str) -> ExtractionRule {
    ExtractionRule {
        target,
        selector: Selector::FirstMatch {
            list: RESOURCE_REQUIREMENTS,
            key_field: "type",
            key_value: kind,
            value_field: "value",
        },
    }
}

const fn value(target: &'static str, path: &'static [&'static str]) -> ExtractionRule {
    ExtractionRule {
        target,
        selector: Selector::Value(path),
    }
}

const fn capability(target: &'static str, literal: &'static str) -> ExtractionRule {
    ExtractionRule {
        target,
        selector: Selector::Contains {
            list: &["detail", "platformCapabilities"],
            literal,
        },
    }
}

/// Container instance registration / deregistration audit events.
pub static INSTANCE_SCHEMA: ExtractionSchema = ExtractionSchema {
    name: "instance",
    rules: &[
        value(
            "containerInstanceArn",
            &[
                "detail",
                "responseElements",
                "containerInstance",
                "containerInstanceArn",
            ],
        ),
        value(
            "ec2InstanceId",
            &[
                "detail",
                "responseElements",
                "containerInstance",
                "ec2InstanceId",
            ],
        ),
        value("cluster", &["detail", "requestParameters", "cluster"]),
        value("eventName", &["detail", "eventName"]),
        value("eventTime", &["detail", "eventTime"]),
        attribute("availabilityZone", "ecs.availability-zone"),
        attribute("instanceType", "ecs.instance-type"),
        attribute("amiId", "ecs.ami-id"),
        attribute("arch", "ecs.cpu-architecture"),
        attribute("os", "ecs.os-type"),
        registered_resource("cpu", "CPU"),
        registered_resource("memory", "MEMORY"),
    ],
};

/// Batch job state change events.
pub static JOB_SCHEMA: ExtractionSchema = ExtractionSchema {
    name: "job",
    rules: &[
        value("jobName", &["detail", "jobName"]),
        value("jobId", &["detail", "jobId"]),
        value("jobQueue", &["detail", "jobQueue"]),
        value("jobDefinition", &["detail", "jobDefinition"]),
        value("region", &["region"]),
        value("status", &["detail", "status"]),
        value("statusReason", &["detail", "statusReason"]),
        value("createdAt", &["detail", "createdAt"]),
        value("startedAt", &["detail", "startedAt"]),
        value("stoppedAt", &["detail", "stoppedAt"]),
        requirement("cpu", "VCPU"),
        requirement("memory", "MEMORY"),
        value(
            "containerInstanceArn",
            &["detail", "container", "containerInstanceArn"],
        ),
        value("taskArn", &["detail", "container", "taskArn"]),
        value("logStreamName", &["detail", "container", "logStreamName"]),
        capability("isFargate", "FARGATE"),
        capability("isEc2", "EC2"),
    ],
};

/// Fargate-only job fields read from the container runtime platform.
pub static FARGATE_SCHEMA: ExtractionSchema = ExtractionSchema {
    name: "fargate",
    rules: &[
        requirement("cpu", "VCPU"),
        requirement("memory", "MEMORY"),
        value(
            "os",
            &[
                "detail",
                "container",
                "runtimePlatform",
                "operatingSystemFamily",
            ],
        ),
        value(
            "arch",
            &["detail", "container", "runtimePlatform", "cpuArchitecture"],
        ),
    ],
};

/// Instance lifecycle fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFields {
    pub container_instance_arn: Option<String>,
    pub ec2_instance_id: Option<String>,
    pub cluster: Option<String>,
    pub event_name: Option<String>,
    pub event_time: Option<String>,
    pub availability_zone: Option<String>,
    pub instance_type: Option<String>,
    pub ami_id: Option<String>,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

impl InstanceFields {
    /// Apply [`INSTANCE_SCHEMA`] to a payload.
    pub fn extract(payload: &Value) -> Self {
        Self::from(&INSTANCE_SCHEMA.extract(payload))
    }
}

impl From<&ExtractedFields> for InstanceFields {
    fn from(fields: &ExtractedFields) -> Self {
        Self {
            container_instance_arn: fields.text("containerInstanceArn"),
            ec2_instance_id: fields.text("ec2InstanceId"),
            cluster: fields.text("cluster"),
            event_name: fields.text("eventName"),
            event_time: fields.text("eventTime"),
            availability_zone: fields.text("availabilityZone"),
            instance_type: fields.text("instanceType"),
            ami_id: fields.text("amiId"),
            arch: fields.text("arch"),
            os: fields.text("os"),
            cpu: fields.text("cpu"),
            memory: fields.text("memory"),
        }
    }
}

/// Job lifecycle fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFields {
    pub job_name: Option<String>,
    pub job_id: Option<String>,
    pub job_queue: Option<String>,
    pub job_definition: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
    pub status_reason: Option<String>,
    pub created_at: Option<i64>,
    pub started_at: Option<i64>,
    pub stopped_at: Option<i64>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub container_instance_arn: Option<String>,
    pub task_arn: Option<String>,
    pub log_stream_name: Option<String>,
    pub is_fargate: bool,
    pub is_ec2: bool,
}

impl JobFields {
    /// Apply [`JOB_SCHEMA`] to a payload.
    pub fn extract(payload: &Value) -> Self {
        Self::from(&JOB_SCHEMA.extract(payload))
    }
}

impl From<&ExtractedFields> for JobFields {
    fn from(fields: &ExtractedFields) -> Self {
        Self {
            job_name: fields.text("jobName"),
            job_id: fields.text("jobId"),
            job_queue: fields.text("jobQueue"),
            job_definition: fields.text("jobDefinition"),
            region: fields.text("region"),
            status: fields.text("status"),
            status_reason: fields.text("statusReason"),
            created_at: fields.integer("createdAt"),
            started_at: fields.integer("startedAt"),
            stopped_at: fields.integer("stoppedAt"),
            cpu: fields.text("cpu"),
            memory: fields.text("memory"),
            container_instance_arn: fields.text("containerInstanceArn"),
            task_arn: fields.text("taskArn"),
            log_stream_name: fields.text("logStreamName"),
            is_fargate: fields.flag("isFargate"),
            is_ec2: fields.flag("isEc2"),
        }
    }
}

/// Fargate runtime platform fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FargateFields {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
}

impl FargateFields {
    /// Apply [`FARGATE_SCHEMA`] to a payload.
    pub fn extract(payload: &Value) -> Self {
        Self::from(&FARGATE_SCHEMA.extract(payload))
    }
}

impl From<&ExtractedFields> for FargateFields {
    fn from(fields: &ExtractedFields) -> Self {
        Self {
            cpu: fields.text("cpu"),
            memory: fields.text("memory"),
            os: fields.text("os"),
            arch: fields.text("arch"),
        }
    }
}
