//! Application services: the stateless/short-lived collaborators the
//! `ExposureSequence` facade composes to run a session. Each is independently
//! testable and holds no long-lived session state of its own (that lives in
//! `ExposureSequence`).

pub mod dependency_resolver;
pub mod event_bus;
pub mod executor;
pub mod priority_calculator;
pub mod resource_arbiter;
pub mod scheduler;
pub mod sky_advisor;
pub mod task_executor;
pub mod task_registry;

pub use dependency_resolver::{DependencyError, DependencyResolver};
pub use event_bus::{EventBus, EventBusConfig, FilteredSubscription};
pub use executor::{TargetExecutor, TargetOutcome};
pub use priority_calculator::PriorityCalculator;
pub use resource_arbiter::{ReservationTimedOut, ResourceArbiter, ResourceGuard};
pub use scheduler::{meridian_flip_task, Candidate, MeridianFlipParams, Scheduler};
pub use sky_advisor::{SkyAdvisor, SkyVerdict};
pub use task_executor::TaskExecutor;
pub use task_registry::{ProgressReporter, TaskBehavior, TaskExecutionContext, TaskRegistry};
