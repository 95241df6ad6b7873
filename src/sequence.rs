//! `ExposureSequence` — the public facade. A thin coordinator over the
//! target graph and the session state machine; it does not itself decide
//! *how* a target runs (that's [`crate::services::executor::TargetExecutor`])
//! or *which* target runs next (that's [`crate::services::scheduler::Scheduler`]).
//!
//! Grounded in the teacher's split between a thin facade and its
//! collaborators (REDESIGN note: "the source exposes 40+ methods on one
//! class" -> split along service lines). Target mutable state is owned by
//! one `tokio::sync::Mutex<Target>` per target rather than one lock over
//! the whole graph, so unrelated targets can run concurrently; the outer
//! `RwLock<Vec<_>>` only guards structural membership (add/remove/load).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::domain::errors::{DomainResult, SequenceError};
use crate::domain::models::event::{Event, EventPayload};
use crate::domain::models::sequence::{
    ExecutionStats, GlobalPolicy, RecoveryStrategy, ResourceUsage, SchedulingStrategy,
    SessionState,
};
use crate::domain::models::target::{Target, TargetStatus};
use crate::domain::models::task::TaskStatus;
use crate::ports::persistence::{
    GlobalPolicySnapshot, SequenceSnapshot, SequenceStore, TargetSnapshot, SNAPSHOT_VERSION,
};
use crate::services::executor::{TargetExecutor, TargetOutcome};
use crate::services::resource_arbiter::ResourceArbiter;
use crate::services::scheduler::{MeridianFlipParams, Scheduler};

/// A target plus the bookkeeping the run loop needs around it. Only the
/// run loop's worker ever holds `target`'s lock for the duration of a run;
/// every other access (queries, mutators) takes it briefly to read or
/// patch fields.
struct TargetSlot {
    target: Mutex<Target>,
    /// Guards against dispatching the same target twice in one scheduling
    /// round while its prior run is still in flight.
    dispatched: AtomicBool,
}

/// Reservation deadline the run loop gives the resource arbiter before
/// treating a target as requeued. Not exposed as policy; it's an internal
/// scheduling-loop parameter, not a session-visible timeout.
const RESERVATION_DEADLINE: Duration = Duration::from_secs(30);

/// Poll interval used when nothing is ready to dispatch or the session is
/// paused.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// The public control surface over one observing session's target graph.
#[derive(Clone)]
pub struct ExposureSequence {
    context: ExecutionContext,
    target_executor: Arc<TargetExecutor>,
    scheduler: Scheduler,
    store: Arc<dyn SequenceStore>,
    session_id: Uuid,

    slots: Arc<RwLock<Vec<Arc<TargetSlot>>>>,
    session_state: Arc<RwLock<SessionState>>,
    stats: Arc<Mutex<ExecutionStats>>,
    next_insertion_order: Arc<AtomicU64>,

    cancellation: Arc<Mutex<Option<CancellationToken>>>,
    arbiter: Arc<Mutex<Option<Arc<ResourceArbiter>>>>,
    run_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    started_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl ExposureSequence {
    pub fn new(
        context: ExecutionContext,
        target_executor: Arc<TargetExecutor>,
        store: Arc<dyn SequenceStore>,
    ) -> Self {
        Self {
            context,
            target_executor,
            scheduler: Scheduler::new(),
            store,
            session_id: Uuid::new_v4(),
            slots: Arc::new(RwLock::new(Vec::new())),
            session_state: Arc::new(RwLock::new(SessionState::Idle)),
            stats: Arc::new(Mutex::new(ExecutionStats::default())),
            next_insertion_order: Arc::new(AtomicU64::new(0)),
            cancellation: Arc::new(Mutex::new(None)),
            arbiter: Arc::new(Mutex::new(None)),
            run_handle: Arc::new(Mutex::new(None)),
            started_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    // ---- graph mutators ----------------------------------------------

    pub async fn add_target(&self, mut target: Target) -> DomainResult<()> {
        let mut slots = self.slots.write().await;
        if Self::find(&slots, &target.name).await.is_some() {
            return Err(SequenceError::DuplicateTarget(target.name));
        }
        target.insertion_order = self.next_insertion_order.fetch_add(1, Ordering::SeqCst);
        slots.push(Arc::new(TargetSlot { target: Mutex::new(target), dispatched: AtomicBool::new(false) }));
        Ok(())
    }

    pub async fn remove_target(&self, name: &str) -> DomainResult<()> {
        self.require_idle_or_stopped().await?;
        let mut slots = self.slots.write().await;
        let pos = Self::find(&slots, name)
            .await
            .ok_or_else(|| SequenceError::TargetNotFound(name.to_string()))?;
        slots.remove(pos);
        Ok(())
    }

    /// Apply `modifier` to the named target under its own lock. The outer
    /// graph only needs a read lock here since membership isn't changing.
    pub async fn modify_target(
        &self,
        name: &str,
        modifier: impl FnOnce(&mut Target),
    ) -> DomainResult<()> {
        let slots = self.slots.read().await;
        let pos = Self::find(&slots, name)
            .await
            .ok_or_else(|| SequenceError::TargetNotFound(name.to_string()))?;
        let mut target = slots[pos].target.lock().await;
        modifier(&mut target);
        Ok(())
    }

    /// Add `dependency` as a prerequisite of `target`, rejecting the
    /// mutation outright if it would introduce a cycle (invariant 1): the
    /// graph is left untouched on `Err`.
    pub async fn add_dependency(&self, target: &str, dependency: &str) -> DomainResult<()> {
        let slots = self.slots.read().await;
        let snapshot: Vec<Target> = {
            let mut out = Vec::with_capacity(slots.len());
            for slot in slots.iter() {
                out.push(slot.target.lock().await.clone());
            }
            out
        };
        if !snapshot.iter().any(|t| t.name == dependency) {
            return Err(SequenceError::TargetNotFound(dependency.to_string()));
        }
        if self.scheduler.would_cycle(&snapshot, target, dependency) {
            return Err(SequenceError::Target(crate::domain::errors::TargetError::CycleRejected));
        }
        let pos = Self::find(&slots, target)
            .await
            .ok_or_else(|| SequenceError::TargetNotFound(target.to_string()))?;
        slots[pos].target.lock().await.add_dependency(dependency);
        Ok(())
    }

    pub async fn remove_dependency(&self, target: &str, dependency: &str) -> DomainResult<()> {
        let slots = self.slots.read().await;
        let pos = Self::find(&slots, target)
            .await
            .ok_or_else(|| SequenceError::TargetNotFound(target.to_string()))?;
        slots[pos].target.lock().await.remove_dependency(dependency);
        Ok(())
    }

    async fn find(slots: &[Arc<TargetSlot>], name: &str) -> Option<usize> {
        for (i, slot) in slots.iter().enumerate() {
            if slot.target.lock().await.name == name {
                return Some(i);
            }
        }
        None
    }

    async fn require_idle_or_stopped(&self) -> DomainResult<()> {
        let state = *self.session_state.read().await;
        if matches!(state, SessionState::Idle | SessionState::Stopped) {
            Ok(())
        } else {
            Err(SequenceError::InvalidSessionState(state))
        }
    }

    // ---- policy setters ------------------------------------------------

    pub fn set_scheduling_strategy(&self, strategy: SchedulingStrategy) {
        let mut policy = self.context.policy();
        policy.scheduling_strategy = strategy;
        self.context.set_policy(policy);
    }

    pub fn set_recovery_strategy(&self, strategy: RecoveryStrategy) {
        let mut policy = self.context.policy();
        policy.recovery_strategy = strategy;
        self.context.set_policy(policy);
    }

    /// `max_concurrent_targets == 0` means unlimited. Takes effect on the
    /// next `start()`; the running arbiter's semaphore size is fixed for
    /// the lifetime of a session.
    pub fn set_max_concurrent_targets(&self, max_concurrent_targets: u32) {
        let mut policy = self.context.policy();
        policy.max_concurrent_targets = max_concurrent_targets;
        self.context.set_policy(policy);
    }

    pub fn set_global_timeout(&self, timeout: Duration) {
        let mut policy = self.context.policy();
        policy.global_timeout = timeout;
        self.context.set_policy(policy);
    }

    pub fn policy(&self) -> GlobalPolicy {
        self.context.policy()
    }

    // ---- lifecycle ------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn start(&self) -> DomainResult<()> {
        {
            let mut state = self.session_state.write().await;
            if !state.can_transition_to(SessionState::Running) {
                return Err(SequenceError::InvalidSessionState(*state));
            }
            *state = SessionState::Running;
        }

        let policy = self.context.policy();
        let arbiter = Arc::new(ResourceArbiter::new(
            policy.max_concurrent_targets,
            policy.total_memory_limit_bytes,
        ));
        *self.arbiter.lock().await = Some(Arc::clone(&arbiter));

        let token = CancellationToken::new();
        *self.cancellation.lock().await = Some(token.clone());
        *self.started_at.lock().await = Some(self.context.clock.now());
        *self.stats.lock().await = ExecutionStats::default();

        self.context.event_bus.publish(Event::new(
            self.session_id,
            None,
            None,
            EventPayload::SessionStarted,
        ));

        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_loop(arbiter, token).await });
        *self.run_handle.lock().await = Some(handle);
        Ok(())
    }

    pub async fn pause(&self) -> DomainResult<()> {
        let mut state = self.session_state.write().await;
        if !state.can_transition_to(SessionState::Paused) {
            return Err(SequenceError::InvalidSessionState(*state));
        }
        *state = SessionState::Paused;
        drop(state);
        self.context
            .event_bus
            .publish(Event::new(self.session_id, None, None, EventPayload::SessionPaused));
        Ok(())
    }

    pub async fn resume(&self) -> DomainResult<()> {
        let mut state = self.session_state.write().await;
        if !state.can_transition_to(SessionState::Running) {
            return Err(SequenceError::InvalidSessionState(*state));
        }
        *state = SessionState::Running;
        drop(state);
        self.context
            .event_bus
            .publish(Event::new(self.session_id, None, None, EventPayload::SessionResumed));
        Ok(())
    }

    /// Request a cooperative stop. Cancels every in-flight task's token and
    /// waits up to `global_timeout / 4` for the run loop to drain before
    /// returning; tasks that don't cooperate within that window are left to
    /// their own per-task timeout to fail them, rather than being aborted
    /// here (spec S6: "otherwise Failed(Timeout)").
    #[instrument(skip(self))]
    pub async fn stop(&self) -> DomainResult<()> {
        {
            let mut state = self.session_state.write().await;
            if !state.can_transition_to(SessionState::Stopping) {
                return Err(SequenceError::InvalidSessionState(*state));
            }
            *state = SessionState::Stopping;
        }

        if let Some(token) = self.cancellation.lock().await.clone() {
            token.cancel();
        }

        let grace = self.context.policy().global_timeout / 4;
        let handle = self.run_handle.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("graceful shutdown window elapsed before the run loop drained");
            }
        }
        Ok(())
    }

    pub async fn retry_failed_targets(&self) -> DomainResult<usize> {
        let slots = self.slots.read().await;
        let mut count = 0;
        for slot in slots.iter() {
            let mut target = slot.target.lock().await;
            if target.status == TargetStatus::Failed {
                target.status = TargetStatus::Pending;
                target.has_run = false;
                for task in &mut target.tasks {
                    if task.is_terminal() {
                        task.reset();
                    }
                }
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn skip_failed_targets(&self) -> DomainResult<usize> {
        let slots = self.slots.read().await;
        let mut count = 0;
        for slot in slots.iter() {
            let mut target = slot.target.lock().await;
            if target.status == TargetStatus::Failed {
                target.status = TargetStatus::Skipped;
                count += 1;
            }
        }
        Ok(count)
    }

    // ---- queries --------------------------------------------------------

    pub async fn progress(&self) -> f32 {
        let slots = self.slots.read().await;
        if slots.is_empty() {
            return 0.0;
        }
        let mut total = 0.0f32;
        for slot in slots.iter() {
            let target = slot.target.lock().await;
            let target_progress = if target.tasks.is_empty() {
                f32::from(target.status == TargetStatus::Completed)
            } else {
                target.tasks.iter().map(|t| t.progress()).sum::<f32>() / target.tasks.len() as f32
            };
            total += target_progress;
        }
        total / slots.len() as f32
    }

    pub async fn execution_stats(&self) -> ExecutionStats {
        let mut stats = *self.stats.lock().await;
        if let Some(started) = *self.started_at.lock().await {
            stats.session_duration_seconds =
                (self.context.clock.now() - started).num_milliseconds() as f64 / 1000.0;
        }
        stats
    }

    pub async fn resource_usage(&self) -> ResourceUsage {
        match self.arbiter.lock().await.as_ref() {
            Some(arbiter) => arbiter.current_usage().await,
            None => ResourceUsage::default(),
        }
    }

    pub async fn failed_targets(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut names = Vec::new();
        for slot in slots.iter() {
            let target = slot.target.lock().await;
            if target.status == TargetStatus::Failed {
                names.push(target.name.clone());
            }
        }
        names
    }

    pub async fn target_names(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut names = Vec::with_capacity(slots.len());
        for slot in slots.iter() {
            names.push(slot.target.lock().await.name.clone());
        }
        names
    }

    pub async fn target_status(&self, name: &str) -> DomainResult<TargetStatus> {
        let slots = self.slots.read().await;
        for slot in slots.iter() {
            let target = slot.target.lock().await;
            if target.name == name {
                return Ok(target.status);
            }
        }
        Err(SequenceError::TargetNotFound(name.to_string()))
    }

    // ---- persistence ----------------------------------------------------

    pub async fn save(&self, path: &str) -> DomainResult<()> {
        let slots = self.slots.read().await;
        let mut targets = Vec::with_capacity(slots.len());
        for slot in slots.iter() {
            targets.push(TargetSnapshot::from(&*slot.target.lock().await));
        }
        let snapshot = SequenceSnapshot {
            version: SNAPSHOT_VERSION,
            global_policy: GlobalPolicySnapshot::from(&self.context.policy()),
            targets,
        };
        self.store.save(&snapshot, path).await.map_err(SequenceError::Persistence)
    }

    /// Load replaces the entire target graph. Per invariant 8, nothing is
    /// mutated until the store's own validation (acyclic, known
    /// dependencies) has passed.
    pub async fn load(&self, path: &str) -> DomainResult<()> {
        self.require_idle_or_stopped().await?;
        let snapshot = self.store.load(path).await.map_err(SequenceError::Persistence)?;

        let mut slots = self.slots.write().await;
        slots.clear();
        let mut order = 0u64;
        for target_snapshot in snapshot.targets {
            let mut target = Target::from(target_snapshot);
            target.insertion_order = order;
            order += 1;
            slots.push(Arc::new(TargetSlot {
                target: Mutex::new(target),
                dispatched: AtomicBool::new(false),
            }));
        }
        self.next_insertion_order.store(order, Ordering::SeqCst);
        drop(slots);
        self.context.set_policy(snapshot.global_policy.into());
        Ok(())
    }

    // ---- run loop ---------------------------------------------------------

    async fn snapshot(&self) -> Vec<(Arc<TargetSlot>, Target)> {
        let slots = self.slots.read().await;
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots.iter() {
            let target = slot.target.lock().await.clone();
            out.push((Arc::clone(slot), target));
        }
        out
    }

    /// Any `Pending` target whose dependency has permanently failed can
    /// never become ready; mark it `Skipped(DependencyUnmet)` rather than
    /// waiting forever (spec S3).
    async fn sweep_unmet_dependencies(&self) {
        let slots = self.slots.read().await;
        let mut settled: HashMap<String, TargetStatus> = HashMap::new();
        for slot in slots.iter() {
            let target = slot.target.lock().await;
            settled.insert(target.name.clone(), target.status);
        }
        for slot in slots.iter() {
            let mut target = slot.target.lock().await;
            if target.status != TargetStatus::Pending {
                continue;
            }
            let blocked = target.dependencies.iter().any(|dep| {
                matches!(settled.get(dep), Some(TargetStatus::Failed) | Some(TargetStatus::Skipped))
            });
            if blocked {
                target.status = TargetStatus::Skipped;
                let name = target.name.clone();
                drop(target);
                self.context.event_bus.publish(Event::new(
                    self.session_id,
                    Some(name),
                    None,
                    EventPayload::TargetSkipped { reason: "dependency unmet".to_string() },
                ));
            }
        }
    }

    #[instrument(skip(self, arbiter, cancellation))]
    async fn run_loop(self, arbiter: Arc<ResourceArbiter>, cancellation: CancellationToken) {
        // `thread_pool_size` sizes the worker pool once for the session's
        // lifetime; every other policy field is re-read each round so
        // live setter calls (scheduling/recovery strategy, timeouts) take
        // effect without a restart.
        let worker_slots =
            Arc::new(tokio::sync::Semaphore::new(self.context.policy().thread_pool_size.max(1)));
        let mut join_set: JoinSet<()> = JoinSet::new();

        loop {
            if cancellation.is_cancelled() {
                break;
            }

            if *self.session_state.read().await == SessionState::Paused {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                continue;
            }

            let policy = self.context.policy();
            self.sweep_unmet_dependencies().await;

            let snapshot = self.snapshot().await;
            let all_settled = snapshot.iter().all(|(_, t)| {
                !t.enabled || !matches!(t.status, TargetStatus::Pending | TargetStatus::InProgress)
            });
            if all_settled {
                break;
            }

            let completed: HashSet<String> = snapshot
                .iter()
                .filter(|(_, t)| t.status == TargetStatus::Completed)
                .map(|(_, t)| t.name.clone())
                .collect();
            let targets_only: Vec<Target> = snapshot.iter().map(|(_, t)| t.clone()).collect();
            let weather = self.context.weather();
            let now = self.context.clock.now();

            let candidates = self.scheduler.candidates(
                &targets_only,
                &completed,
                now,
                self.context.site,
                &weather,
                &self.context.weather_limits,
                &policy,
            );
            let ordered = self.scheduler.order(&targets_only, candidates, policy.scheduling_strategy);

            let mut dispatched_any = false;
            for candidate in ordered {
                let Some((slot, _)) = snapshot.iter().find(|(_, t)| t.name == candidate.target.name)
                else {
                    continue;
                };
                if slot.dispatched.swap(true, Ordering::SeqCst) {
                    continue;
                }
                let Ok(permit) = Arc::clone(&worker_slots).try_acquire_owned() else {
                    slot.dispatched.store(false, Ordering::SeqCst);
                    continue;
                };

                dispatched_any = true;
                let verdict = candidate.verdict.clone();
                let flip_params = MeridianFlipParams::default();
                let target_name = candidate.target.name.clone();
                let flipped = {
                    let mut target = slot.target.lock().await;
                    self.scheduler.maybe_insert_meridian_flip(&mut target, &verdict, flip_params)
                };
                if flipped {
                    self.context.event_bus.publish(Event::new(
                        self.session_id,
                        Some(target_name),
                        None,
                        EventPayload::MeridianFlipTriggered {
                            flip_offset_minutes: flip_params.flip_offset_minutes,
                        },
                    ));
                }

                let this = self.clone();
                let slot = Arc::clone(slot);
                let arbiter = Arc::clone(&arbiter);
                let device = Arc::clone(&self.context.device);
                let recovery_strategy = policy.recovery_strategy;
                let child_token = cancellation.child_token();
                let session_id = self.session_id;

                join_set.spawn(async move {
                    let outcome = {
                        let mut target = slot.target.lock().await;
                        this.target_executor
                            .run(
                                &mut target,
                                &verdict,
                                device,
                                &this.context.event_bus,
                                &arbiter,
                                session_id,
                                recovery_strategy,
                                RESERVATION_DEADLINE,
                                child_token,
                            )
                            .await
                    };
                    this.record_outcome(&slot, outcome, recovery_strategy).await;
                    slot.dispatched.store(false, Ordering::SeqCst);
                    drop(permit);
                });
            }

            if !dispatched_any {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }

            while join_set.try_join_next().is_some() {}
        }

        while join_set.join_next().await.is_some() {}

        let reason = if cancellation.is_cancelled() {
            "stopped by request".to_string()
        } else {
            "all targets settled".to_string()
        };
        *self.session_state.write().await = SessionState::Stopped;
        self.context.event_bus.publish(Event::new(
            self.session_id,
            None,
            None,
            EventPayload::SessionStopped { reason },
        ));
    }

    /// Update aggregate stats and, for an `Alternative`-recovered failure,
    /// enqueue the target's first alternative at (approximately) the head
    /// of the ready set.
    async fn record_outcome(
        &self,
        slot: &Arc<TargetSlot>,
        outcome: TargetOutcome,
        recovery_strategy: RecoveryStrategy,
    ) {
        {
            let mut stats = self.stats.lock().await;
            match outcome {
                TargetOutcome::Completed => stats.targets_completed += 1,
                TargetOutcome::Failed => stats.targets_failed += 1,
                TargetOutcome::Skipped => stats.targets_skipped += 1,
                TargetOutcome::Requeued | TargetOutcome::StopRequested => {}
            }
        }

        if matches!(outcome, TargetOutcome::Completed | TargetOutcome::Failed) {
            let target = slot.target.lock().await;
            let mut stats = self.stats.lock().await;
            for task in &target.tasks {
                match task.status() {
                    TaskStatus::Completed => {
                        stats.tasks_completed += 1;
                        if task.task_type == "TakeExposure" {
                            if let Some(secs) =
                                task.param_values.get("duration_secs").and_then(|v| v.as_f64())
                            {
                                stats.total_exposure_seconds += secs;
                            }
                        }
                    }
                    TaskStatus::Failed | TaskStatus::Cancelled => stats.tasks_failed += 1,
                    _ => {}
                }
            }
        }

        let alternative = if outcome == TargetOutcome::Failed && recovery_strategy == RecoveryStrategy::Alternative
        {
            let mut target = slot.target.lock().await;
            if target.alternatives.is_empty() {
                None
            } else {
                Some(target.alternatives.remove(0))
            }
        } else {
            None
        };

        if let Some(mut alt) = alternative {
            alt.insertion_order = 0;
            let mut slots = self.slots.write().await;
            slots.insert(
                0,
                Arc::new(TargetSlot { target: Mutex::new(alt), dispatched: AtomicBool::new(false) }),
            );
        }

        if outcome == TargetOutcome::StopRequested {
            self.request_stop().await;
        }
    }

    /// A target's recovery strategy escalated to a full session stop
    /// (`RecoveryStrategy::Stop`, or `Alternative` with no alternative
    /// left): move to `Stopping` and cancel, same as a caller-initiated
    /// `stop()`, but without waiting on the run loop's own `JoinHandle`
    /// since this is called from inside that loop.
    async fn request_stop(&self) {
        {
            let mut state = self.session_state.write().await;
            if state.can_transition_to(SessionState::Stopping) {
                *state = SessionState::Stopping;
            }
        }
        if let Some(token) = self.cancellation.lock().await.clone() {
            token.cancel();
        }
    }
}
