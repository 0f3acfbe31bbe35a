// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event classification.
//!
//! Maps an [`EventEnvelope`] to the lifecycle case it describes:
//!
//! | Family | `source` | `detail-type` | Discriminator |
//! |--------|----------|---------------|---------------|
//! | Instance lifecycle | `aws.ecs` | `AWS API Call via CloudTrail` | `detail.eventName` |
//! | Job lifecycle | `aws.batch` | `Batch Job State Change` | `detail.status` |
//!
//! Anything else classifies as [`Classification::Ignored`]. An envelope that
//! carries `detail.errorCode` is ignored before any other check.

use std::fmt;

use tracing::debug;

use crate::envelope::EventEnvelope;

/// Source of container orchestration audit events.
pub const INSTANCE_SOURCE: &str = "aws.ecs";
/// Detail type of audited API calls.
pub const INSTANCE_DETAIL_TYPE: &str = "AWS API Call via CloudTrail";
/// Source of batch job state changes.
pub const JOB_SOURCE: &str = "aws.batch";
/// Detail type of batch job state changes.
pub const JOB_DETAIL_TYPE: &str = "Batch Job State Change";

/// Audited action for container instance registration.
pub const REGISTER_ACTION: &str = "RegisterContainerInstance";
/// Audited action for container instance deregistration.
pub const DEREGISTER_ACTION: &str = "DeregisterContainerInstance";

/// Lifecycle case of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A container instance joined a cluster.
    InstanceRegistered,
    /// A container instance left a cluster.
    InstanceDeregistered,
    /// A job started running.
    JobRunning,
    /// A job finished successfully.
    JobSucceeded,
    /// A job failed after a task was placed.
    JobFailed,
    /// Any other job status (submitted, runnable, failed before placement, ...).
    JobOther {
        /// The reported status, if any.
        status: Option<String>,
    },
    /// The event is not one the engine acts on.
    Ignored(IgnoreReason),
}

/// Why an envelope was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The audited call failed upstream.
    UpstreamError(String),
    /// The source / detail type pair is not a known family.
    UnknownSource,
    /// An audit event for an action other than (de)registration.
    UnknownAction(Option<String>),
}

impl Classification {
    /// Whether the job reached a final state that is recorded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobSucceeded | Self::JobFailed)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceRegistered => write!(f, "instance_registered"),
            Self::InstanceDeregistered => write!(f, "instance_deregistered"),
            Self::JobRunning => write!(f, "job_running"),
            Self::JobSucceeded => write!(f, "job_succeeded"),
            Self::JobFailed => write!(f, "job_failed"),
            Self::JobOther { .. } => write!(f, "job_other"),
            Self::Ignored(_) => write!(f, "ignored"),
        }
    }
}

/// Classify an envelope.
pub fn classify(envelope: &EventEnvelope) -> Classification {
    if let Some(code) = envelope.error_code() {
        debug!(error_code = code, "Upstream call failed, ignoring event");
        return Classification::Ignored(IgnoreReason::UpstreamError(code.to_string()));
    }

    let classification = match (envelope.source.as_str(), envelope.detail_type.as_str()) {
        (INSTANCE_SOURCE, INSTANCE_DETAIL_TYPE) => classify_instance(envelope),
        (JOB_SOURCE, JOB_DETAIL_TYPE) => classify_job(envelope),
        _ => Classification::Ignored(IgnoreReason::UnknownSource),
    };

    debug!(
        source = %envelope.source,
        detail_type = %envelope.detail_type,
        %classification,
        "Event classified"
    );

    classification
}

fn classify_instance(envelope: &EventEnvelope) -> Classification {
    match envelope.event_name() {
        Some(REGISTER_ACTION) => Classification::InstanceRegistered,
        Some(DEREGISTER_ACTION) => Classification::InstanceDeregistered,
        other => Classification::Ignored(IgnoreReason::UnknownAction(other.map(str::to_string))),
    }
}

fn classify_job(envelope: &EventEnvelope) -> Classification {
    match envelope.status() {
        Some("RUNNING") => Classification::JobRunning,
        Some("SUCCEEDED") => Classification::JobSucceeded,
        Some("FAILED") if envelope.task_ref().is_some() => Classification::JobFailed,
        other => Classification::JobOther {
            status: other.map(str::to_string),
        },
    }
}
