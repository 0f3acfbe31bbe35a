// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metadata records and field-scoped partial updates.
//!
//! Instance and job records share one store and one attribute set. Every
//! attribute is optional: each event kind owns a subset of fields and
//! writes only that subset, so a record is the merge of everything written
//! to its key so far.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classifier::REGISTER_ACTION;

/// Record discriminator within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Container instance record.
    Instance,
    /// Batch job record.
    Job,
}

impl SortKey {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(Self::Instance),
            "job" => Ok(Self::Job),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

/// Composite identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    /// Subject of the record.
    pub partition_key: String,
    /// Record kind.
    pub sort_key: SortKey,
}

impl RecordKey {
    /// Key of an instance record written for `event_name` on
    /// `container_instance_arn`. The parts are concatenated without a
    /// separator.
    pub fn instance(container_instance_arn: &str, event_name: &str) -> Self {
        Self {
            partition_key: format!("{}{}", container_instance_arn, event_name),
            sort_key: SortKey::Instance,
        }
    }

    /// Key of the registration record of a container instance, which job
    /// records link to.
    pub fn registered_instance(container_instance_arn: &str) -> Self {
        Self::instance(container_instance_arn, REGISTER_ACTION)
    }

    /// Key of a job record.
    pub fn job(job_id: &str) -> Self {
        Self {
            partition_key: job_id.to_string(),
            sort_key: SortKey::Job,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.sort_key)
    }
}

/// Execution platform of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Node-based execution on container instances.
    #[serde(rename = "EC2")]
    Ec2,
    /// Serverless execution.
    #[serde(rename = "FARGATE")]
    Fargate,
}

impl Platform {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2 => "EC2",
            Self::Fargate => "FARGATE",
        }
    }
}

/// Attributes of a metadata record. Unset fields are not part of the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataAttributes {
    /// Container instance ARN (instance records, EC2 jobs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_instance_arn: Option<String>,
    /// Underlying compute instance id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec2_instance_id: Option<String>,
    /// Partition key of the instance record this record refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ref: Option<String>,
    /// Owning cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Availability zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Compute instance type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Machine image id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_id: Option<String>,
    /// CPU units (instances) or vCPUs (jobs), as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory in MiB, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// CPU architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Operating system family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// RFC 3339 launch time of the compute instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<String>,
    /// Value of the monitoring tag when the instance was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_monitoring: Option<String>,
    /// Lifecycle action that last wrote the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_type: Option<String>,
    /// Time of that action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_time: Option<String>,
    /// Execution platform of the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Job status as last reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Reason attached to the last status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Job name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    /// Queue the job was submitted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_queue: Option<String>,
    /// Job definition the job runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_definition: Option<String>,
    /// Region the job runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<i64>,
    /// Task placed for the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_arn: Option<String>,
    /// Log stream of the job container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_stream_name: Option<String>,
}

macro_rules! merge_fields {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

impl MetadataAttributes {
    /// Overwrite exactly the fields set in `patch`; everything else is kept.
    pub fn merge(&mut self, patch: &MetadataAttributes) {
        merge_fields!(self, patch;
            container_instance_arn,
            ec2_instance_id,
            instance_ref,
            cluster,
            availability_zone,
            instance_type,
            ami_id,
            cpu,
            memory,
            arch,
            os,
            launch_time,
            runtime_monitoring,
            last_event_type,
            last_event_time,
            platform,
            status,
            status_reason,
            job_name,
            job_queue,
            job_definition,
            region,
            started_at,
            stopped_at,
            task_arn,
            log_stream_name,
        );
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Set fields keyed by their stored (camelCase) names.
    pub fn to_fields(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Rebuild attributes from stored fields. Unknown names are ignored.
    pub fn from_fields(fields: Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(fields))
    }

    /// Stored names of the set fields, sorted.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .to_fields()
            .map(|fields| fields.into_iter().map(|(name, _)| name).collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// A durable metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Composite identity.
    pub key: RecordKey,
    /// Attributes written so far.
    pub attributes: MetadataAttributes,
}

impl MetadataRecord {
    /// Create a record.
    pub fn new(key: RecordKey, attributes: MetadataAttributes) -> Self {
        Self { key, attributes }
    }

    /// Merge `patch` into this record, leaving fields it does not set
    /// untouched.
    pub fn apply_partial_update(&mut self, patch: &MetadataAttributes) {
        self.attributes.merge(patch);
    }
}
