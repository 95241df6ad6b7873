//! Single-task execution: the deterministic state walk every [`Task`] goes
//! through — `Idle -> Validating -> Running -> {Completed, Failed,
//! Cancelled}` — with pre/post hooks, a per-attempt timeout, and retries
//! governed by the task's [`RetryStrategy`].
//!
//! Grounded in the teacher's `dag_executor` (timeout-wrapped attempt loop,
//! structured `tracing` spans per task, typed execution events), adapted
//! from wave-based task-graph execution to one task at a time since target
//! tasks run sequentially by spec.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{ErrorKind, TaskError};
use crate::domain::models::event::{Event, EventPayload};
use crate::domain::models::task::{Task, TaskStatus};
use crate::ports::clock::SharedClock;
use crate::ports::device_gateway::DeviceGateway;
use crate::services::event_bus::EventBus;
use crate::services::task_registry::{TaskExecutionContext, TaskRegistry};

/// Runs one task to completion, applying hooks, timeout, and retries.
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    clock: SharedClock,
}

impl TaskExecutor {
    pub fn new(registry: Arc<TaskRegistry>, clock: SharedClock) -> Self {
        Self { registry, clock }
    }

    /// Execute `task` against `device`, publishing lifecycle events to
    /// `event_bus` tagged with `session_id`/`target_name`. Returns `Ok(())`
    /// once the task reaches `Completed`; any other terminal outcome is
    /// returned as the corresponding [`TaskError`], with `task.status()`
    /// already reflecting it.
    #[instrument(skip(self, task, device, event_bus, cancellation), fields(task_id = %task.id, task_type = %task.task_type))]
    pub async fn execute(
        &self,
        task: &mut Task,
        device: Arc<dyn DeviceGateway>,
        event_bus: &EventBus,
        session_id: Uuid,
        target_name: &str,
        cancellation: CancellationToken,
    ) -> Result<(), TaskError> {
        task.transition_to(TaskStatus::Validating).map_err(|_| TaskError::InvalidTransition {
            from: task.status().to_string(),
            to: TaskStatus::Validating.to_string(),
        })?;

        if let Err(violations) = task.validate() {
            let message = violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            task.fail(ErrorKind::InvalidParameter, message.clone());
            return Err(TaskError::InvalidParameter(message));
        }

        let Some(behavior) = self.registry.get(&task.task_type) else {
            let message = format!("no behavior registered for task type {:?}", task.task_type);
            task.fail(ErrorKind::SystemError, message.clone());
            return Err(TaskError::System(anyhow::anyhow!(message)));
        };

        for (name, hook) in task.hooks.pre().to_vec() {
            if let Err(source) = hook(&task.name) {
                task.fail(ErrorKind::HookError, format!("pre-hook {name} failed: {source}"));
                return Err(TaskError::Hook { phase: "pre", name, source });
            }
        }

        task.transition_to(TaskStatus::Running).map_err(|_| TaskError::InvalidTransition {
            from: task.status().to_string(),
            to: TaskStatus::Running.to_string(),
        })?;
        event_bus.publish(Event::new(
            session_id,
            Some(target_name.to_string()),
            Some(task.id),
            EventPayload::TaskStarted,
        ));

        let params = task.effective_params();
        let max_attempts = task.retry_count + 1;
        let mut last_error: Option<(ErrorKind, String)> = None;

        let outcome = 'attempts: loop {
            for attempt in 0..max_attempts {
                let progress_bits = Arc::new(AtomicU32::new(0.0f32.to_bits()));
                let reporter_bits = Arc::clone(&progress_bits);
                let reporter_bus = event_bus.clone();
                let reporter_session = session_id;
                let reporter_target = target_name.to_string();
                let reporter_task = task.id;
                let progress: crate::services::task_registry::ProgressReporter = Arc::new(move |p| {
                    reporter_bits.store(p.to_bits(), Ordering::Relaxed);
                    reporter_bus.publish(Event::new(
                        reporter_session,
                        Some(reporter_target.clone()),
                        Some(reporter_task),
                        EventPayload::TaskProgress { progress: p },
                    ));
                });

                let ctx = TaskExecutionContext {
                    params: params.clone(),
                    device: Arc::clone(&device),
                    cancellation: cancellation.clone(),
                    progress,
                };

                let attempt_result = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => Err(TaskError::Cancelled(task.id)),
                    timed = tokio::time::timeout(task.timeout, behavior.execute(&ctx)) => {
                        match timed {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(e)) => Err(e),
                            Err(_) => Err(TaskError::Timeout(task.id)),
                        }
                    }
                };

                task.set_progress(f32::from_bits(progress_bits.load(Ordering::Relaxed)));

                match attempt_result {
                    Ok(()) => break 'attempts Ok(()),
                    Err(TaskError::Cancelled(id)) => break 'attempts Err(TaskError::Cancelled(id)),
                    Err(e) => {
                        let kind = e.kind();
                        let message = e.to_string();
                        warn!(attempt, max_attempts, %message, "task attempt failed");
                        last_error = Some((kind, message.clone()));
                        task.push_history(format!("attempt {attempt} failed: {message}"));

                        if attempt + 1 < max_attempts {
                            let delay = task.retry_strategy.delay_for(attempt, Some(&message));
                            if delay > std::time::Duration::ZERO {
                                tokio::select! {
                                    _ = cancellation.cancelled() => break 'attempts Err(TaskError::Cancelled(task.id)),
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                            continue;
                        }
                        break 'attempts Err(e);
                    }
                }
            }
        };

        let exit_code = match &outcome {
            Ok(_) => 0,
            Err(TaskError::Cancelled(_)) => -1,
            Err(_) => 1,
        };
        for (name, hook) in task.hooks.post().to_vec() {
            if let Err(source) = hook(&task.name, exit_code) {
                warn!(%name, %source, "post-hook failed, task outcome unaffected");
            }
        }

        match outcome {
            Ok(()) => {
                task.transition_to(TaskStatus::Completed).ok();
                info!("task completed");
                event_bus.publish(Event::new(
                    session_id,
                    Some(target_name.to_string()),
                    Some(task.id),
                    EventPayload::TaskCompleted,
                ));
                Ok(())
            }
            Err(TaskError::Cancelled(id)) => {
                task.fail(ErrorKind::Cancelled, "cancelled".to_string());
                task.transition_to(TaskStatus::Cancelled).ok();
                Err(TaskError::Cancelled(id))
            }
            Err(e) => {
                let (kind, message) = last_error.unwrap_or_else(|| (e.kind(), e.to_string()));
                task.fail(kind, message.clone());
                event_bus.publish(Event::new(
                    session_id,
                    Some(target_name.to_string()),
                    Some(task.id),
                    EventPayload::TaskFailed { kind, message, attempts: max_attempts },
                ));
                Err(e)
            }
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}
