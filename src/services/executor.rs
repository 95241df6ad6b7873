//! Target-level orchestration: runs one target's task list to completion,
//! reserving resources up front and applying the session's
//! [`RecoveryStrategy`] on task failure.
//!
//! Grounded in the teacher's `dag_executor` wave-runner (resource-gated
//! admission before a unit of work starts, typed outcome per unit), adapted
//! from a DAG of tasks to a target's strictly sequential task list (spec
//! §4.5: "tasks within a target run sequentially").

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::TaskError;
use crate::domain::models::event::{Event, EventPayload};
use crate::domain::models::sequence::RecoveryStrategy;
use crate::domain::models::target::{Target, TargetStatus};
use crate::domain::models::task::TaskStatus;
use crate::ports::device_gateway::DeviceGateway;
use crate::services::event_bus::EventBus;
use crate::services::resource_arbiter::ResourceArbiter;
use crate::services::sky_advisor::SkyVerdict;
use crate::services::task_executor::TaskExecutor;

/// How a target's run ended, from the owning sequence's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Completed,
    /// Failed and handled locally (`Skip`/exhausted `Retry`); the session
    /// continues with the next target.
    Failed,
    /// The sky advisor denied execution outright; distinct from `Failed`
    /// per spec §4's failure table ("target skipped, not failed").
    Skipped,
    /// A resource reservation timed out before its deadline; the target is
    /// untouched (still `Pending`) and should be retried at the tail of the
    /// next selection round.
    Requeued,
    /// `Stop` recovery, or `Alternative` with no alternative left to try:
    /// the whole session should move to `Stopping`.
    StopRequested,
}

/// Runs one target, end to end, against the given device and resources.
pub struct TargetExecutor {
    task_executor: Arc<TaskExecutor>,
}

impl TargetExecutor {
    pub fn new(task_executor: Arc<TaskExecutor>) -> Self {
        Self { task_executor }
    }

    #[instrument(skip(self, target, device, event_bus, arbiter, cancellation), fields(target_name = %target.name))]
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        target: &mut Target,
        verdict: &SkyVerdict,
        device: Arc<dyn DeviceGateway>,
        event_bus: &EventBus,
        arbiter: &ResourceArbiter,
        session_id: Uuid,
        recovery_strategy: RecoveryStrategy,
        reservation_deadline: Duration,
        cancellation: CancellationToken,
    ) -> TargetOutcome {
        if !verdict.observable {
            target.status = TargetStatus::Skipped;
            event_bus.publish(Event::new(
                session_id,
                Some(target.name.clone()),
                None,
                EventPayload::TargetSkipped { reason: verdict.reasons.join("; ") },
            ));
            return TargetOutcome::Skipped;
        }

        let memory_bytes: u64 =
            target.tasks.iter().map(|t| t.resource_limits.memory_bytes as u64).sum();
        let guard = match arbiter.reserve(memory_bytes, reservation_deadline).await {
            Ok(guard) => guard,
            Err(_timed_out) => {
                event_bus.publish(Event::new(
                    session_id,
                    Some(target.name.clone()),
                    None,
                    EventPayload::TargetSkipped {
                        reason: "resource reservation timed out".to_string(),
                    },
                ));
                return TargetOutcome::Requeued;
            }
        };

        target.status = TargetStatus::InProgress;
        target.has_run = true;
        event_bus.publish(Event::new(
            session_id,
            Some(target.name.clone()),
            None,
            EventPayload::TargetStarted,
        ));

        let mut idx = 0;
        while idx < target.tasks.len() {
            if target.tasks[idx].is_terminal() {
                idx += 1;
                continue;
            }

            if cancellation.is_cancelled() {
                drop(guard);
                return TargetOutcome::StopRequested;
            }

            let task_token = cancellation.child_token();
            let result = self
                .task_executor
                .execute(
                    &mut target.tasks[idx],
                    Arc::clone(&device),
                    event_bus,
                    session_id,
                    &target.name,
                    task_token,
                )
                .await;

            match result {
                Ok(()) => idx += 1,
                Err(TaskError::Cancelled(_)) => {
                    drop(guard);
                    target.status = TargetStatus::Failed;
                    return TargetOutcome::StopRequested;
                }
                Err(task_err) => {
                    let outcome = self
                        .apply_recovery(target, idx, recovery_strategy, &device, event_bus, session_id, &cancellation)
                        .await;
                    match outcome {
                        RecoveryOutcome::Recovered => {
                            idx += 1;
                            continue;
                        }
                        RecoveryOutcome::TargetFailed => {
                            drop(guard);
                            self.publish_failure(event_bus, session_id, target, &task_err);
                            return TargetOutcome::Failed;
                        }
                        RecoveryOutcome::Stop => {
                            drop(guard);
                            self.publish_failure(event_bus, session_id, target, &task_err);
                            return TargetOutcome::StopRequested;
                        }
                    }
                }
            }
        }

        drop(guard);
        target.status = TargetStatus::Completed;
        info!(target = %target.name, "target completed");
        event_bus.publish(Event::new(
            session_id,
            Some(target.name.clone()),
            None,
            EventPayload::TargetCompleted,
        ));
        TargetOutcome::Completed
    }

    /// Apply `recovery_strategy` after task `idx` in `target` has failed.
    /// Mutates `target`'s task statuses (marking remainder `Skipped`) and
    /// overall status as the chosen strategy dictates, but leaves event
    /// publication and the resource guard to the caller.
    async fn apply_recovery(
        &self,
        target: &mut Target,
        idx: usize,
        recovery_strategy: RecoveryStrategy,
        device: &Arc<dyn DeviceGateway>,
        event_bus: &EventBus,
        session_id: Uuid,
        cancellation: &CancellationToken,
    ) -> RecoveryOutcome {
        match recovery_strategy {
            RecoveryStrategy::Stop => {
                target.status = TargetStatus::Failed;
                RecoveryOutcome::Stop
            }
            RecoveryStrategy::Skip => {
                mark_remaining_skipped(target, idx + 1);
                target.status = TargetStatus::Failed;
                RecoveryOutcome::TargetFailed
            }
            RecoveryStrategy::Retry => {
                let outer_attempts = target.tasks[idx].retry_count.max(1);
                for _ in 0..outer_attempts {
                    if cancellation.is_cancelled() {
                        break;
                    }
                    target.tasks[idx].reset();
                    let retry_token = cancellation.child_token();
                    let retried = self
                        .task_executor
                        .execute(
                            &mut target.tasks[idx],
                            Arc::clone(device),
                            event_bus,
                            session_id,
                            &target.name,
                            retry_token,
                        )
                        .await;
                    if retried.is_ok() {
                        return RecoveryOutcome::Recovered;
                    }
                    warn!(target = %target.name, "executor-level retry attempt failed");
                }
                mark_remaining_skipped(target, idx + 1);
                target.status = TargetStatus::Failed;
                RecoveryOutcome::TargetFailed
            }
            RecoveryStrategy::Alternative => {
                target.status = TargetStatus::Failed;
                if target.alternatives.is_empty() {
                    RecoveryOutcome::Stop
                } else {
                    RecoveryOutcome::TargetFailed
                }
            }
        }
    }

    fn publish_failure(&self, event_bus: &EventBus, session_id: Uuid, target: &Target, err: &TaskError) {
        event_bus.publish(Event::new(
            session_id,
            Some(target.name.clone()),
            None,
            EventPayload::TargetFailed { kind: err.kind(), message: err.to_string() },
        ));
    }
}

enum RecoveryOutcome {
    Recovered,
    TargetFailed,
    Stop,
}

fn mark_remaining_skipped(target: &mut Target, from_idx: usize) {
    for task in target.tasks.iter_mut().skip(from_idx) {
        if !task.is_terminal() {
            task.transition_to(TaskStatus::Skipped).ok();
        }
    }
}
