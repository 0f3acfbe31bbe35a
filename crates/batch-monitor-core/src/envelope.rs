// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inbound event envelopes delivered by the event bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One lifecycle event as delivered by the bus.
///
/// Only the discriminators are typed; the `detail` object differs per
/// source and is walked by the extraction schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Emitting control plane (e.g. `aws.ecs`, `aws.batch`).
    pub source: String,
    /// Event family within the source.
    #[serde(rename = "detail-type", alias = "detailType")]
    pub detail_type: String,
    /// Delivery timestamp as sent by the bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Region the event originated in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Source-specific payload.
    #[serde(default)]
    pub detail: Value,
}

impl EventEnvelope {
    /// Parse an envelope from its JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The full envelope as a JSON value, the root extraction paths walk from.
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `detail.eventName` for API-call audit events.
    pub fn event_name(&self) -> Option<&str> {
        self.detail_str("eventName")
    }

    /// `detail.status` for job state changes.
    pub fn status(&self) -> Option<&str> {
        self.detail_str("status")
    }

    /// `detail.errorCode`, set when the audited API call failed.
    pub fn error_code(&self) -> Option<&str> {
        self.detail_str("errorCode").filter(|code| !code.is_empty())
    }

    /// `detail.container.taskArn` for job state changes.
    pub fn task_ref(&self) -> Option<&str> {
        self.detail
            .get("container")
            .and_then(|container| container.get("taskArn"))
            .and_then(Value::as_str)
            .filter(|arn| !arn.is_empty())
    }

    fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(Value::as_str)
    }
}
