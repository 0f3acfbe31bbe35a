// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metadata merge engine.
//!
//! Every envelope is an independent unit of work: classify, extract, then
//! perform at most one store write. Malformed, errored or uninteresting
//! events resolve to [`Outcome::NoOp`]. Store and describer failures are
//! returned as errors so the hosting substrate can re-drive the event; every
//! write is field-scoped or a whole-record replace, so re-driving is safe.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{Span, debug, info, instrument, warn};

use crate::classifier::{
    Classification, DEREGISTER_ACTION, IgnoreReason, REGISTER_ACTION, classify,
};
use crate::describe::{InstanceDescriber, MonitoringPolicy};
use crate::envelope::EventEnvelope;
use crate::error::Result;
use crate::extract::{FargateFields, InstanceFields, JobFields};
use crate::persistence::MetadataStore;
use crate::record::{MetadataAttributes, MetadataRecord, Platform, RecordKey};
use crate::state_machine::{JobLifecycleState, JobTransitionInput};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of processing one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was written.
    NoOp(NoOpReason),
    /// An instance record was created or replaced.
    InstanceUpserted {
        /// Key of the written record.
        key: RecordKey,
    },
    /// A job record was partially updated.
    JobUpdated {
        /// Key of the updated record.
        key: RecordKey,
        /// Which update was applied.
        kind: JobUpdateKind,
        /// States visited, `Start` through `End`.
        path: Vec<JobLifecycleState>,
    },
}

impl Outcome {
    /// Whether the store was written.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }
}

/// Why an envelope produced no write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoOpReason {
    /// The classifier ignored the envelope.
    Ignored(IgnoreReason),
    /// A job status the engine does not record.
    UnhandledStatus(Option<String>),
    /// The identifiers needed to key the record are missing.
    MissingIdentity,
    /// The instance is not tagged for monitoring.
    MonitoringDisabled,
    /// The describer does not know the instance.
    InstanceNotDescribed,
}

/// Which job update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobUpdateKind {
    /// Status and stop time.
    Terminal,
    /// Running on Fargate.
    Fargate,
    /// Running on a container instance.
    Ec2 {
        /// Whether the instance registration record was found and copied.
        linked_instance: bool,
    },
}

/// Counts over a processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Envelopes processed.
    pub processed: usize,
    /// Envelopes that wrote a record.
    pub written: usize,
    /// Envelopes that resolved to a no-op.
    pub no_op: usize,
    /// Envelopes that failed with an error.
    pub failed: usize,
}

impl BatchSummary {
    /// Summarize a batch of results.
    pub fn from_results(results: &[Result<Outcome>]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.processed += 1;
            match result {
                Ok(outcome) if outcome.is_write() => summary.written += 1,
                Ok(_) => summary.no_op += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Applies lifecycle events to the metadata store.
#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn MetadataStore>,
    describer: Arc<dyn InstanceDescriber>,
    policy: MonitoringPolicy,
}

impl MergeEngine {
    /// Create an engine.
    pub fn new(
        store: Arc<dyn MetadataStore>,
        describer: Arc<dyn InstanceDescriber>,
        policy: MonitoringPolicy,
    ) -> Self {
        Self {
            store,
            describer,
            policy,
        }
    }

    /// Process one envelope.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store or the describer fails. The
    /// event can be re-driven as-is.
    #[instrument(
        skip(self, envelope),
        fields(
            source = %envelope.source,
            detail_type = %envelope.detail_type,
            classification = tracing::field::Empty
        )
    )]
    pub async fn process(&self, envelope: &EventEnvelope) -> Result<Outcome> {
        let classification = classify(envelope);
        Span::current().record("classification", tracing::field::display(&classification));

        match classification {
            Classification::Ignored(reason) => {
                debug!(?reason, "Event ignored");
                Ok(Outcome::NoOp(NoOpReason::Ignored(reason)))
            }
            Classification::InstanceRegistered => {
                self.process_instance(envelope, REGISTER_ACTION).await
            }
            Classification::InstanceDeregistered => {
                self.process_instance(envelope, DEREGISTER_ACTION).await
            }
            job => self.process_job(envelope, &job).await,
        }
    }

    /// Process independent envelopes with at most `max_concurrency` in
    /// flight. Results are returned in input order.
    pub async fn process_all<I>(&self, envelopes: I, max_concurrency: usize) -> Vec<Result<Outcome>>
    where
        I: IntoIterator<Item = EventEnvelope>,
    {
        let mut results: Vec<(usize, Result<Outcome>)> =
            stream::iter(envelopes.into_iter().enumerate())
                .map(|(index, envelope)| async move { (index, self.process(&envelope).await) })
                .buffer_unordered(max_concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    // ------------------------------------------------------------------------
    // Instance lifecycle
    // ------------------------------------------------------------------------

    async fn process_instance(&self, envelope: &EventEnvelope, action: &str) -> Result<Outcome> {
        let fields = InstanceFields::extract(&envelope.payload());

        let (Some(arn), Some(instance_id)) = (
            fields.container_instance_arn.clone(),
            fields.ec2_instance_id.clone(),
        ) else {
            debug!("Instance event without container instance ARN or instance id");
            return Ok(Outcome::NoOp(NoOpReason::MissingIdentity));
        };

        let Some(description) = self.describer.describe_instance(&instance_id).await? else {
            debug!(%instance_id, "Instance not described, not tracking");
            return Ok(Outcome::NoOp(NoOpReason::InstanceNotDescribed));
        };

        if !self.policy.is_monitored(&description) {
            debug!(
                %instance_id,
                tag = %self.policy.tag_key,
                "Instance not tagged for monitoring"
            );
            return Ok(Outcome::NoOp(NoOpReason::MonitoringDisabled));
        }

        let key = RecordKey::instance(&arn, action);
        let attributes = MetadataAttributes {
            container_instance_arn: Some(arn),
            ec2_instance_id: Some(instance_id),
            instance_ref: Some(key.partition_key.clone()),
            cluster: fields.cluster,
            availability_zone: fields.availability_zone,
            instance_type: fields.instance_type,
            ami_id: fields.ami_id,
            cpu: fields.cpu,
            memory: fields.memory,
            arch: fields.arch,
            os: fields.os,
            launch_time: description.launch_time.map(|t| t.to_rfc3339()),
            runtime_monitoring: description.tag(&self.policy.tag_key).map(str::to_string),
            last_event_type: Some(action.to_string()),
            last_event_time: fields.event_time.or_else(|| envelope.time.clone()),
            ..Default::default()
        };

        self.store
            .put_item(&MetadataRecord::new(key.clone(), attributes))
            .await?;

        info!(%key, "Instance record upserted");
        Ok(Outcome::InstanceUpserted { key })
    }

    // ------------------------------------------------------------------------
    // Job lifecycle
    // ------------------------------------------------------------------------

    async fn process_job(
        &self,
        envelope: &EventEnvelope,
        classification: &Classification,
    ) -> Result<Outcome> {
        if let Classification::JobOther { status } = classification {
            debug!(?status, "Job status not recorded");
            return Ok(Outcome::NoOp(NoOpReason::UnhandledStatus(status.clone())));
        }

        let payload = envelope.payload();
        let job = JobFields::extract(&payload);

        let Some(job_id) = job.job_id.clone() else {
            debug!("Job event without job id");
            return Ok(Outcome::NoOp(NoOpReason::MissingIdentity));
        };
        let key = RecordKey::job(&job_id);

        let input = JobTransitionInput {
            classification,
            is_fargate: job.is_fargate,
        };

        let mut state = JobLifecycleState::Start;
        let mut path = vec![state];
        let mut linked: Option<MetadataRecord> = None;
        let mut kind: Option<JobUpdateKind> = None;

        while !state.is_end() {
            let next = state.transition(&input);
            debug!(from = %state, to = %next, "Job state transition");
            state = next;
            path.push(state);

            match state {
                JobLifecycleState::Ec2Lookup => {
                    linked = self.lookup_linked_instance(&job).await?;
                }
                JobLifecycleState::FargateUpdate => {
                    let patch = fargate_attributes(&job, FargateFields::extract(&payload));
                    self.store.update_item(&key, &patch).await?;
                    info!(%key, fields = ?patch.field_names(), "Fargate job record updated");
                    kind = Some(JobUpdateKind::Fargate);
                }
                JobLifecycleState::Ec2Update => {
                    let patch = ec2_attributes(&job, linked.as_ref());
                    self.store.update_item(&key, &patch).await?;
                    info!(%key, fields = ?patch.field_names(), "EC2 job record updated");
                    kind = Some(JobUpdateKind::Ec2 {
                        linked_instance: linked.is_some(),
                    });
                }
                JobLifecycleState::TerminalUpdate => {
                    let patch = terminal_attributes(&job);
                    self.store.update_item(&key, &patch).await?;
                    info!(%key, status = ?job.status, "Job record finalized");
                    kind = Some(JobUpdateKind::Terminal);
                }
                JobLifecycleState::Start
                | JobLifecycleState::PlatformDispatch
                | JobLifecycleState::End => {}
            }
        }

        Ok(match kind {
            Some(kind) => Outcome::JobUpdated { key, kind, path },
            None => Outcome::NoOp(NoOpReason::UnhandledStatus(job.status)),
        })
    }

    async fn lookup_linked_instance(&self, job: &JobFields) -> Result<Option<MetadataRecord>> {
        let Some(arn) = job.container_instance_arn.as_deref() else {
            warn!(job_id = ?job.job_id, "EC2 job without container instance ARN");
            return Ok(None);
        };

        let key = RecordKey::registered_instance(arn);
        let record = self.store.get_item(&key).await?;
        if record.is_none() {
            warn!(%key, "No instance record for EC2 job, instance fields omitted");
        }
        Ok(record)
    }
}

fn running_attributes(job: &JobFields) -> MetadataAttributes {
    MetadataAttributes {
        started_at: job.started_at,
        cpu: job.cpu.clone(),
        memory: job.memory.clone(),
        job_name: job.job_name.clone(),
        job_queue: job.job_queue.clone(),
        job_definition: job.job_definition.clone(),
        region: job.region.clone(),
        task_arn: job.task_arn.clone(),
        log_stream_name: job.log_stream_name.clone(),
        ..Default::default()
    }
}

fn fargate_attributes(job: &JobFields, fargate: FargateFields) -> MetadataAttributes {
    let mut attributes = running_attributes(job);
    attributes.platform = Some(Platform::Fargate);
    attributes.os = fargate.os;
    attributes.arch = fargate.arch;
    if fargate.cpu.is_some() {
        attributes.cpu = fargate.cpu;
    }
    if fargate.memory.is_some() {
        attributes.memory = fargate.memory;
    }
    attributes
}

fn ec2_attributes(job: &JobFields, linked: Option<&MetadataRecord>) -> MetadataAttributes {
    let mut attributes = running_attributes(job);
    attributes.platform = Some(Platform::Ec2);
    attributes.container_instance_arn = job.container_instance_arn.clone();

    if let Some(instance) = linked {
        let linked = &instance.attributes;
        attributes.os = linked.os.clone();
        attributes.arch = linked.arch.clone();
        attributes.ec2_instance_id = linked.ec2_instance_id.clone();
        attributes.instance_ref = linked
            .instance_ref
            .clone()
            .or_else(|| Some(instance.key.partition_key.clone()));
    }
    attributes
}

fn terminal_attributes(job: &JobFields) -> MetadataAttributes {
    MetadataAttributes {
        status: job.status.clone(),
        stopped_at: job.stopped_at,
        ..Default::default()
    }
}
