//! Pure domain entities: Task, Target, Sequence policy, Event, Weather.
//! Framework-agnostic; no I/O, no async.

pub mod event;
pub mod sequence;
pub mod target;
pub mod task;
pub mod weather;

pub use event::{Event, EventFilter, EventKind, EventPayload};
pub use sequence::{ExecutionStats, GlobalPolicy, RecoveryStrategy, ResourceUsage, SchedulingStrategy, SessionState};
pub use target::{Coordinates, Target, TargetStatus};
pub use task::{
    HistoryEntry, Hooks, ParameterDef, ParameterType, ParameterValidationError, PostHook, PreHook,
    ResourceLimits, RetryStrategy, Task, TaskStatus,
};
pub use weather::{SiteLocation, WeatherLimits, WeatherSnapshot};
