//! Root-level types for the exposure sequence: scheduling/recovery policy,
//! session state machine, and execution statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the scheduler picks the next ready target(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategy {
    /// Emit ready targets in insertion order.
    Fifo,
    /// Emit ready targets sorted by `(priority desc, insertion_order asc)`.
    Priority,
    /// Topological order over the dependency DAG, Priority tie-break among
    /// DAG-ready targets.
    Dependencies,
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        Self::Fifo
    }
}

/// How a target failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Target fails; the whole session moves to `Stopping`.
    Stop,
    /// Remaining tasks are marked `Skipped`; target fails; session
    /// continues.
    Skip,
    /// Rerun the failing task up to its retry budget before applying
    /// `Stop`/`Skip`.
    Retry,
    /// Mark the target `Failed`; if an alternative exists, enqueue it at
    /// the head of the ready set, else escalate per the global strategy.
    Alternative,
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Top-level session state machine.
///
/// ```text
/// Idle --start--> Running --pause--> Paused --resume--> Running
///                    |
///                    +--stop--> Stopping --(all done)--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopping)
                | (Paused, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// Session-wide policy, mutable via the facade's setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPolicy {
    pub scheduling_strategy: SchedulingStrategy,
    pub recovery_strategy: RecoveryStrategy,
    /// 0 means unlimited, per the spec's Open Question resolution.
    pub max_concurrent_targets: u32,
    /// Soft memory budget enforced by the `ResourceArbiter`; 0 means no cap.
    pub total_memory_limit_bytes: u64,
    pub global_timeout: Duration,
    pub default_min_altitude_degrees: f64,
    pub meridian_window_minutes: f64,
    /// Whether `Paused` extends in-flight timeouts. Defaults to `false`
    /// per the spec's Open Question resolution.
    pub pause_extends_timeouts: bool,
    pub thread_pool_size: usize,
    pub weather_poll_interval: Duration,
}

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self {
            scheduling_strategy: SchedulingStrategy::default(),
            recovery_strategy: RecoveryStrategy::default(),
            max_concurrent_targets: 1,
            total_memory_limit_bytes: 0,
            global_timeout: Duration::from_secs(8 * 3600),
            default_min_altitude_degrees: 30.0,
            meridian_window_minutes: 10.0,
            pause_extends_timeouts: false,
            thread_pool_size: 4,
            weather_poll_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl GlobalPolicy {
    /// `max_concurrent_targets == 0` is unlimited (Open Question
    /// resolution).
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent_targets == 0 {
            None
        } else {
            Some(self.max_concurrent_targets as usize)
        }
    }
}

/// Aggregate execution statistics for `getExecutionStats`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub targets_completed: u64,
    pub targets_failed: u64,
    pub targets_skipped: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_retried: u64,
    pub total_exposure_seconds: f64,
    pub session_duration_seconds: f64,
}

/// Current resource usage for `getResourceUsage`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub reserved_memory_bytes: u64,
    pub memory_limit_bytes: u64,
    pub in_progress_targets: u32,
    pub max_concurrent_targets: u32,
}
