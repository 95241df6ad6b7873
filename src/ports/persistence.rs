//! Persistence port: an abstract session file layout plus the `SequenceStore`
//! trait. The concrete file format is left to the implementer (spec §1);
//! this crate ships one JSON-backed implementation in
//! [`crate::persistence::file_store`].
//!
//! Live [`crate::domain::models::task::Task`]/[`crate::domain::models::target::Target`]
//! values hold non-serializable policy (hook closures, custom retry
//! functions) by design, so persistence works over a serializable
//! projection (`*Snapshot`) rather than the live types directly. Loading a
//! snapshot always resets status to the pre-run value (invariant 8): tasks
//! to `Idle`, targets to `Pending`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::sequence::GlobalPolicy;
use crate::domain::models::target::{Coordinates, Target, TargetStatus};
use crate::domain::models::task::{ParameterDef, Task, TaskStatus};

/// Serializable retry-policy projection. `Custom` loses its closure on
/// save; the caller must re-attach a custom delay function after load
/// (documented wart of modeling closures as policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategySnapshot {
    None,
    Linear { base_delay_secs: u64 },
    Exponential { base_delay_secs: u64, ceiling_secs: u64 },
    Custom,
}

impl From<&crate::domain::models::task::RetryStrategy> for RetryStrategySnapshot {
    fn from(value: &crate::domain::models::task::RetryStrategy) -> Self {
        use crate::domain::models::task::RetryStrategy as R;
        match value {
            R::None => Self::None,
            R::Linear { base_delay } => Self::Linear { base_delay_secs: base_delay.as_secs() },
            R::Exponential { base_delay, ceiling } => Self::Exponential {
                base_delay_secs: base_delay.as_secs(),
                ceiling_secs: ceiling.as_secs(),
            },
            R::Custom(_) => Self::Custom,
        }
    }
}

impl From<RetryStrategySnapshot> for crate::domain::models::task::RetryStrategy {
    fn from(value: RetryStrategySnapshot) -> Self {
        match value {
            RetryStrategySnapshot::None | RetryStrategySnapshot::Custom => Self::None,
            RetryStrategySnapshot::Linear { base_delay_secs } => {
                Self::Linear { base_delay: Duration::from_secs(base_delay_secs) }
            }
            RetryStrategySnapshot::Exponential { base_delay_secs, ceiling_secs } => Self::Exponential {
                base_delay: Duration::from_secs(base_delay_secs),
                ceiling: Duration::from_secs(ceiling_secs),
            },
        }
    }
}

/// Serializable projection of one [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub task_type: String,
    pub parameters: Vec<ParameterDef>,
    pub param_values: std::collections::HashMap<String, serde_json::Value>,
    pub priority: u8,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_strategy: RetryStrategySnapshot,
    pub resource_limits: crate::domain::models::task::ResourceLimits,
    pub idempotent: bool,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            task_type: task.task_type.clone(),
            parameters: task.parameters().to_vec(),
            param_values: task.param_values.clone(),
            priority: task.priority,
            timeout_secs: task.timeout.as_secs(),
            retry_count: task.retry_count,
            retry_strategy: (&task.retry_strategy).into(),
            resource_limits: task.resource_limits,
            idempotent: task.idempotent,
        }
    }
}

impl From<TaskSnapshot> for Task {
    fn from(snapshot: TaskSnapshot) -> Self {
        let mut task = Task::new(snapshot.name, snapshot.task_type);
        for def in snapshot.parameters {
            task.define_parameter(def.name, def.param_type, def.required, def.default, def.description);
        }
        task.param_values = snapshot.param_values;
        task.priority = snapshot.priority;
        task.timeout = Duration::from_secs(snapshot.timeout_secs);
        task.retry_count = snapshot.retry_count;
        task.retry_strategy = snapshot.retry_strategy.into();
        task.resource_limits = snapshot.resource_limits;
        task.idempotent = snapshot.idempotent;
        debug_assert_eq!(task.status(), TaskStatus::Idle);
        task
    }
}

/// Serializable projection of one [`Target`], recursively including
/// alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub name: String,
    pub enabled: bool,
    pub priority: u8,
    pub coordinates: Option<Coordinates>,
    pub dependencies: Vec<String>,
    pub alternatives: Vec<TargetSnapshot>,
    pub tasks: Vec<TaskSnapshot>,
    pub min_altitude_degrees: Option<f64>,
    pub timeout_secs: Option<u64>,
}

impl From<&Target> for TargetSnapshot {
    fn from(target: &Target) -> Self {
        Self {
            name: target.name.clone(),
            enabled: target.enabled,
            priority: target.priority,
            coordinates: target.coordinates,
            dependencies: target.dependencies.iter().cloned().collect(),
            alternatives: target.alternatives.iter().map(TargetSnapshot::from).collect(),
            tasks: target.tasks.iter().map(TaskSnapshot::from).collect(),
            min_altitude_degrees: target.min_altitude_degrees,
            timeout_secs: target.timeout.map(|d| d.as_secs()),
        }
    }
}

impl From<TargetSnapshot> for Target {
    fn from(snapshot: TargetSnapshot) -> Self {
        let mut target = Target::new(snapshot.name);
        target.enabled = snapshot.enabled;
        target.priority = snapshot.priority;
        target.coordinates = snapshot.coordinates;
        target.dependencies = snapshot.dependencies.into_iter().collect::<HashSet<_>>();
        target.alternatives = snapshot.alternatives.into_iter().map(Target::from).collect();
        target.tasks = snapshot.tasks.into_iter().map(Task::from).collect();
        target.min_altitude_degrees = snapshot.min_altitude_degrees;
        target.timeout = snapshot.timeout_secs.map(Duration::from_secs);
        debug_assert_eq!(target.status, TargetStatus::Pending);
        target
    }
}

/// Serializable projection of [`GlobalPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPolicySnapshot {
    pub scheduling_strategy: crate::domain::models::sequence::SchedulingStrategy,
    pub recovery_strategy: crate::domain::models::sequence::RecoveryStrategy,
    pub max_concurrent_targets: u32,
    pub total_memory_limit_bytes: u64,
    pub global_timeout_secs: u64,
    pub default_min_altitude_degrees: f64,
    pub meridian_window_minutes: f64,
    pub pause_extends_timeouts: bool,
    pub thread_pool_size: usize,
    pub weather_poll_interval_secs: u64,
}

impl From<&GlobalPolicy> for GlobalPolicySnapshot {
    fn from(policy: &GlobalPolicy) -> Self {
        Self {
            scheduling_strategy: policy.scheduling_strategy,
            recovery_strategy: policy.recovery_strategy,
            max_concurrent_targets: policy.max_concurrent_targets,
            total_memory_limit_bytes: policy.total_memory_limit_bytes,
            global_timeout_secs: policy.global_timeout.as_secs(),
            default_min_altitude_degrees: policy.default_min_altitude_degrees,
            meridian_window_minutes: policy.meridian_window_minutes,
            pause_extends_timeouts: policy.pause_extends_timeouts,
            thread_pool_size: policy.thread_pool_size,
            weather_poll_interval_secs: policy.weather_poll_interval.as_secs(),
        }
    }
}

impl From<GlobalPolicySnapshot> for GlobalPolicy {
    fn from(snapshot: GlobalPolicySnapshot) -> Self {
        Self {
            scheduling_strategy: snapshot.scheduling_strategy,
            recovery_strategy: snapshot.recovery_strategy,
            max_concurrent_targets: snapshot.max_concurrent_targets,
            total_memory_limit_bytes: snapshot.total_memory_limit_bytes,
            global_timeout: Duration::from_secs(snapshot.global_timeout_secs),
            default_min_altitude_degrees: snapshot.default_min_altitude_degrees,
            meridian_window_minutes: snapshot.meridian_window_minutes,
            pause_extends_timeouts: snapshot.pause_extends_timeouts,
            thread_pool_size: snapshot.thread_pool_size,
            weather_poll_interval: Duration::from_secs(snapshot.weather_poll_interval_secs),
        }
    }
}

/// The whole-session file contents: `{version, global_policy, targets}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    pub version: u32,
    pub global_policy: GlobalPolicySnapshot,
    pub targets: Vec<TargetSnapshot>,
}

pub const SNAPSHOT_VERSION: u32 = 1;

/// Save/load the target graph plus global policy. Load is atomic: either
/// the whole graph loads and validates, or no change is made to caller
/// state (the caller is responsible for only swapping state in once
/// `load` returns `Ok`).
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn save(&self, snapshot: &SequenceSnapshot, path: &str) -> anyhow::Result<()>;
    async fn load(&self, path: &str) -> anyhow::Result<SequenceSnapshot>;
}
