// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compute instance description lookups.
//!
//! Registration events only say which container instance joined. Whether it
//! is tracked depends on the tags of the underlying compute instance, which
//! the engine reads through an [`InstanceDescriber`].

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use self::http::HttpInstanceDescriber;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::DescribeError;

/// Tag key that opts an instance into tracking.
pub const MONITORING_TAG: &str = "RuntimeMonitoring";
/// Tag value that opts an instance into tracking.
pub const MONITORING_ENABLED: &str = "enabled";

/// What the describe API reports about a compute instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescription {
    /// Compute instance id.
    pub instance_id: String,
    /// When the instance was launched.
    #[serde(default)]
    pub launch_time: Option<DateTime<Utc>>,
    /// Instance tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl InstanceDescription {
    /// Value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Decides which described instances are tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringPolicy {
    /// Tag key looked up on the instance.
    pub tag_key: String,
    /// Exact value the tag must have.
    pub tag_value: String,
}

impl Default for MonitoringPolicy {
    fn default() -> Self {
        Self {
            tag_key: MONITORING_TAG.to_string(),
            tag_value: MONITORING_ENABLED.to_string(),
        }
    }
}

impl MonitoringPolicy {
    /// Whether the instance opted into tracking.
    pub fn is_monitored(&self, description: &InstanceDescription) -> bool {
        description.tag(&self.tag_key) == Some(self.tag_value.as_str())
    }
}

/// Describe lookups keyed by compute instance id.
#[async_trait]
pub trait InstanceDescriber: Send + Sync {
    /// Describe an instance; `None` if it is unknown.
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, DescribeError>;
}

/// Describer over a fixed set of descriptions.
#[derive(Debug, Default)]
pub struct StaticInstanceDescriber {
    instances: RwLock<HashMap<String, InstanceDescription>>,
}

impl StaticInstanceDescriber {
    /// Create an empty describer; every lookup returns `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a describer seeded with descriptions.
    pub fn with_instances(instances: impl IntoIterator<Item = InstanceDescription>) -> Self {
        Self {
            instances: RwLock::new(
                instances
                    .into_iter()
                    .map(|description| (description.instance_id.clone(), description))
                    .collect(),
            ),
        }
    }

    /// Add or replace a description.
    pub async fn insert(&self, description: InstanceDescription) {
        self.instances
            .write()
            .await
            .insert(description.instance_id.clone(), description);
    }
}

#[async_trait]
impl InstanceDescriber for StaticInstanceDescriber {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, DescribeError> {
        Ok(self.instances.read().await.get(instance_id).cloned())
    }
}
