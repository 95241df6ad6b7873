//! Domain error taxonomy for the imaging sequence execution core.
//!
//! Kinds mirror the error table in the specification: each failure a task,
//! target, or session can experience is tagged with one [`ErrorKind`] so
//! that recovery policy and event payloads can be driven off a closed set
//! rather than string matching.

use thiserror::Error;
use uuid::Uuid;

/// Closed set of failure kinds a task/target/session can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Parameter schema validation failed before the task left `Validating`.
    InvalidParameter,
    /// The device gateway returned a failure for a domain operation.
    DeviceError,
    /// A per-task, per-target, or global deadline was exceeded.
    Timeout,
    /// Cooperative cancellation was observed.
    Cancelled,
    /// A pre- or post-execution hook raised.
    HookError,
    /// A target became ready but one of its dependencies failed.
    DependencyUnmet,
    /// The sky advisor denied execution (altitude/meridian/weather).
    SkyUnsafe,
    /// The resource arbiter denied a reservation before its deadline.
    ResourceUnavailable,
    /// An unexpected internal failure not covered by the other kinds.
    SystemError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::DeviceError => "device_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::HookError => "hook_error",
            Self::DependencyUnmet => "dependency_unmet",
            Self::SkyUnsafe => "sky_unsafe",
            Self::ResourceUnavailable => "resource_unavailable",
            Self::SystemError => "system_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable error payload attached to a failed task.
///
/// Carried verbatim on `TaskFailed` events alongside the task's history
/// snapshot, per the specification's user-visible error contract.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
    pub last_attempt_ts: chrono::DateTime<chrono::Utc>,
}

/// Errors raised while operating on a single [`crate::domain::models::task::Task`].
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("parameter validation failed: {0}")]
    InvalidParameter(String),

    #[error("device gateway error: {0}")]
    Device(String),

    #[error("task {0} exceeded its timeout")]
    Timeout(Uuid),

    #[error("task {0} was cancelled")]
    Cancelled(Uuid),

    #[error("{phase} hook {name:?} failed: {source}")]
    Hook {
        phase: &'static str,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("system error: {0}")]
    System(#[source] anyhow::Error),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::Device(_) => ErrorKind::DeviceError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Hook { .. } => ErrorKind::HookError,
            Self::InvalidTransition { .. } => ErrorKind::SystemError,
            Self::System(_) => ErrorKind::SystemError,
        }
    }
}

/// Errors raised while operating on a [`crate::domain::models::target::Target`].
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target dependency not satisfied: {0}")]
    DependencyUnmet(String),

    #[error("sky advisor denied execution: {0:?}")]
    SkyUnsafe(Vec<String>),

    #[error("resource reservation timed out")]
    ResourceUnavailable,

    #[error("target task failed: {0}")]
    TaskFailed(#[from] TaskError),

    #[error("duplicate target name: {0}")]
    DuplicateName(String),

    #[error("adding this dependency would introduce a cycle")]
    CycleRejected,
}

impl TargetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DependencyUnmet(_) => ErrorKind::DependencyUnmet,
            Self::SkyUnsafe(_) => ErrorKind::SkyUnsafe,
            Self::ResourceUnavailable => ErrorKind::ResourceUnavailable,
            Self::TaskFailed(e) => e.kind(),
            Self::DuplicateName(_) | Self::CycleRejected => ErrorKind::SystemError,
        }
    }
}

/// Session/facade-scope errors: configuration, persistence, programmer
/// errors. These propagate to the facade caller rather than surfacing as
/// task/target events (see spec §7 propagation policy).
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("operation not permitted while session is in state {0:?}")]
    InvalidSessionState(crate::domain::models::sequence::SessionState),

    #[error("target {0}")]
    Target(#[from] TargetError),

    #[error("persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("configuration error: {0}")]
    Configuration(#[source] anyhow::Error),
}

pub type DomainResult<T> = Result<T, SequenceError>;
