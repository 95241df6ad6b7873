//! Task domain model — one atomic unit of work (e.g. `Slew`, `TakeExposure`,
//! `PlateSolve`) executed against a device or solver.
//!
//! A `Task` owns its parameter schema, policy (priority/timeout/retry),
//! lifecycle hooks, and an append-only history. It does not own its own
//! behavior: the [`crate::services::task_registry::TaskRegistry`] maps the
//! task-type string to a behavior function, and only the
//! [`crate::services::task_executor`] mutates status — see the "shared
//! mutable status maps" redesign note.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ErrorKind;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Validating,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl TaskStatus {
    /// Terminal statuses are sticky: nothing transitions out of them
    /// without an explicit `reset()`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many attempts a retry strategy schedules, and the delay between them.
#[derive(Clone)]
pub enum RetryStrategy {
    /// No retry: a single attempt only.
    None,
    /// Wait `k * base_delay` before attempt `k + 1`.
    Linear { base_delay: Duration },
    /// Wait `base_delay * 2^k`, capped by `ceiling`.
    Exponential { base_delay: Duration, ceiling: Duration },
    /// Delegate to a user-supplied function `(attempt, last_error) -> delay`.
    Custom(Arc<dyn Fn(u32, Option<&str>) -> Duration + Send + Sync>),
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "RetryStrategy::None"),
            Self::Linear { base_delay } => {
                f.debug_struct("Linear").field("base_delay", base_delay).finish()
            }
            Self::Exponential { base_delay, ceiling } => f
                .debug_struct("Exponential")
                .field("base_delay", base_delay)
                .field("ceiling", ceiling)
                .finish(),
            Self::Custom(_) => write!(f, "RetryStrategy::Custom(..)"),
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::None
    }
}

impl RetryStrategy {
    /// Delay to wait before attempt `attempt + 1` (0-indexed `attempt`).
    pub fn delay_for(&self, attempt: u32, last_error: Option<&str>) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Linear { base_delay } => *base_delay * attempt,
            Self::Exponential { base_delay, ceiling } => {
                let scaled = base_delay.saturating_mul(1u32 << attempt.min(31));
                scaled.min(*ceiling)
            }
            Self::Custom(f) => f(attempt, last_error),
        }
    }
}

/// Per-task resource limits enforced by the [`crate::services::resource_arbiter::ResourceArbiter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { memory_bytes: 0, cpu_percent: 0.0 }
    }
}

/// JSON-ish type tag for a parameter, used for schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Bool,
    Json,
}

impl ParameterType {
    fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Json => true,
        }
    }
}

/// One entry in a task's parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub description: String,
}

/// Validation failure for a single parameter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parameter {name}: {reason}")]
pub struct ParameterValidationError {
    pub name: String,
    pub reason: String,
}

/// One entry in a task's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: TaskStatus,
    pub message: String,
}

/// A pre-execution hook: invoked with the task name before the body runs.
pub type PreHook = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;
/// A post-execution hook: invoked with the task name and exit code (0 on
/// success, non-zero on failure, -1 on cancellation) after the body runs.
pub type PostHook = Arc<dyn Fn(&str, i32) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pre: Vec<(String, PreHook)>,
    post: Vec<(String, PostHook)>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre", &self.pre.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("post", &self.post.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

impl Hooks {
    pub fn push_pre(&mut self, name: impl Into<String>, hook: PreHook) {
        self.pre.push((name.into(), hook));
    }

    pub fn push_post(&mut self, name: impl Into<String>, hook: PostHook) {
        self.post.push((name.into(), hook));
    }

    pub fn pre(&self) -> &[(String, PreHook)] {
        &self.pre
    }

    pub fn post(&self) -> &[(String, PostHook)] {
        &self.post
    }
}

/// A discrete, atomic unit of imaging-sequence work.
#[derive(Clone)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub task_type: String,

    /// Ordered parameter schema, built via `define_parameter` before first
    /// execution.
    parameters: Vec<ParameterDef>,
    /// Runtime values supplied by the client, validated against `parameters`
    /// before the task leaves `Validating`.
    pub param_values: HashMap<String, serde_json::Value>,

    pub priority: u8,
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_strategy: RetryStrategy,
    pub log_level: tracing::Level,
    pub resource_limits: ResourceLimits,
    /// Whether this task's body is safe to re-run from scratch on retry.
    /// Non-idempotent tasks still honor `retry_count` but the executor logs
    /// a warning before each retry attempt.
    pub idempotent: bool,

    pub status: TaskStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub progress: f32,
    history: Vec<HistoryEntry>,

    pub hooks: Hooks,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("task_type", &self.task_type)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .finish()
    }
}

impl Task {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            task_type: task_type.into(),
            parameters: Vec::new(),
            param_values: HashMap::new(),
            priority: 5,
            timeout: Duration::from_secs(300),
            retry_count: 0,
            retry_strategy: RetryStrategy::None,
            log_level: tracing::Level::INFO,
            resource_limits: ResourceLimits::default(),
            idempotent: true,
            status: TaskStatus::default(),
            error_kind: None,
            error_message: None,
            progress: 0.0,
            history: Vec::new(),
            hooks: Hooks::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry_count: u32, strategy: RetryStrategy) -> Self {
        self.retry_count = retry_count;
        self.retry_strategy = strategy;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.param_values.insert(name.into(), value);
        self
    }

    /// Build the parameter schema. Callable only before first execution
    /// (i.e. while `status == Idle`); the caller is expected to respect
    /// this, mirroring the spec's "callable only before first execution".
    pub fn define_parameter(
        &mut self,
        name: impl Into<String>,
        param_type: ParameterType,
        required: bool,
        default: Option<serde_json::Value>,
        description: impl Into<String>,
    ) {
        self.parameters.push(ParameterDef {
            name: name.into(),
            param_type,
            required,
            default,
            description: description.into(),
        });
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Validate `param_values` (falling back to each parameter's default)
    /// against the declared schema.
    pub fn validate(&self) -> Result<(), Vec<ParameterValidationError>> {
        let mut errors = Vec::new();
        for def in &self.parameters {
            match self.param_values.get(&def.name).or(def.default.as_ref()) {
                Some(value) => {
                    if !def.param_type.matches(value) {
                        errors.push(ParameterValidationError {
                            name: def.name.clone(),
                            reason: format!("expected {:?}", def.param_type),
                        });
                    }
                }
                None if def.required => errors.push(ParameterValidationError {
                    name: def.name.clone(),
                    reason: "required parameter missing".to_string(),
                }),
                None => {}
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective parameter map: declared defaults overridden by runtime
    /// values, exactly what a task behavior function receives.
    pub fn effective_params(&self) -> HashMap<String, serde_json::Value> {
        let mut out = HashMap::new();
        for def in &self.parameters {
            if let Some(default) = &def.default {
                out.insert(def.name.clone(), default.clone());
            }
        }
        out.extend(self.param_values.clone());
        out
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Append-only history push. Never removes or reorders prior entries.
    pub fn push_history(&mut self, message: impl Into<String>) {
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            status: self.status,
            message: message.into(),
        });
    }

    /// Set progress, enforcing monotonicity within a run (invariant 5).
    /// A retry resets progress to 0 via [`Task::reset`], after which
    /// monotonicity tracking starts over.
    pub fn set_progress(&mut self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        if clamped >= self.progress {
            self.progress = clamped;
        }
    }

    /// Transition to a new status, recording history and timestamps.
    /// Terminal statuses are sticky: no caller may transition out of one
    /// except via [`Task::reset`].
    pub fn transition_to(&mut self, status: TaskStatus) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!(
                "task {} is terminal ({}); call reset() before transitioning",
                self.id, self.status
            ));
        }
        self.status = status;
        match status {
            TaskStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Skipped => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        self.push_history(format!("transitioned to {status}"));
        Ok(())
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        self.error_kind = Some(kind);
        self.error_message = Some(message.clone());
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.push_history(format!("failed ({kind}): {message}"));
    }

    /// Reset a terminal task back to `Idle`, clearing error state and
    /// progress but preserving history. Per the spec's Open Question
    /// decision, this is the only sanctioned way to retry a `Cancelled`
    /// task.
    pub fn reset(&mut self) {
        self.status = TaskStatus::Idle;
        self.error_kind = None;
        self.error_message = None;
        self.progress = 0.0;
        self.started_at = None;
        self.completed_at = None;
        self.push_history("reset to idle");
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
