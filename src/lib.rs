//! Imaging sequence execution core for an observatory control server.
//!
//! The crate is organized hexagonally: [`domain`] holds pure entities and
//! errors, [`ports`] the capability interfaces the core depends on but does
//! not implement (devices, the clock, persistence), [`services`] the
//! stateless collaborators ([`services::scheduler::Scheduler`],
//! [`services::executor::TargetExecutor`], [`services::resource_arbiter::ResourceArbiter`],
//! ...), and [`sequence`] the public facade, [`ExposureSequence`], that
//! composes them into one running session.
//!
//! [`builtin_tasks`] supplies the concrete `Slew`/`TakeExposure`/
//! `PlateSolve`/`MeridianFlip` task behaviors; a deployment that needs more
//! task types registers additional [`services::task_registry::TaskBehavior`]
//! implementations on its own [`services::task_registry::TaskRegistry`].

pub mod builtin_tasks;
pub mod config;
pub mod context;
pub mod domain;
pub mod logging;
pub mod persistence;
pub mod ports;
pub mod sequence;
pub mod services;

pub use context::ExecutionContext;
pub use sequence::ExposureSequence;
