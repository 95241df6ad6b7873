//! Built-in task behaviors: the four task types named in the specification's
//! data model — `Slew`, `TakeExposure`, `PlateSolve`, and the scheduler's
//! synthesized `MeridianFlip`. Each is a thin adapter from
//! [`TaskExecutionContext`] onto [`DeviceGateway`] calls.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::TaskError;
use crate::domain::models::task::{ParameterType, Task};
use crate::services::task_executor::TaskExecutor;
use crate::services::task_registry::{TaskBehavior, TaskExecutionContext, TaskRegistry};

/// `Slew` — point the mount at a target's coordinates.
pub struct SlewBehavior;

#[async_trait]
impl TaskBehavior for SlewBehavior {
    async fn execute(&self, ctx: &TaskExecutionContext) -> Result<(), TaskError> {
        let ra_hours = ctx.param_f64("ra_hours").ok_or_else(|| missing("ra_hours"))?;
        let dec_degrees = ctx.param_f64("dec_degrees").ok_or_else(|| missing("dec_degrees"))?;
        (ctx.progress)(0.0);
        ctx.device.slew(ra_hours, dec_degrees).await.map_err(device_error)?;
        (ctx.progress)(1.0);
        Ok(())
    }
}

/// `TakeExposure` — expose the camera for `duration_secs`, optionally
/// selecting a filter first.
pub struct TakeExposureBehavior;

#[async_trait]
impl TaskBehavior for TakeExposureBehavior {
    async fn execute(&self, ctx: &TaskExecutionContext) -> Result<(), TaskError> {
        let duration_secs = ctx.param_f64("duration_secs").ok_or_else(|| missing("duration_secs"))?;
        if let Some(filter) = ctx.param_str("filter") {
            ctx.device.set_filter(filter).await.map_err(device_error)?;
        }
        (ctx.progress)(0.0);
        ctx.device
            .expose(Duration::from_secs_f64(duration_secs.max(0.0)))
            .await
            .map_err(device_error)?;
        (ctx.progress)(1.0);
        Ok(())
    }
}

/// `PlateSolve` — confirm pointing by solving the last frame. This core
/// doesn't implement an actual solver (spec §1 Non-goal); it drives the
/// gateway's status check as the solving stand-in a real deployment would
/// replace with a solver client.
pub struct PlateSolveBehavior;

#[async_trait]
impl TaskBehavior for PlateSolveBehavior {
    async fn execute(&self, ctx: &TaskExecutionContext) -> Result<(), TaskError> {
        (ctx.progress)(0.0);
        ctx.device
            .status(crate::ports::device_gateway::DeviceKind::Camera)
            .await
            .map_err(device_error)?;
        (ctx.progress)(1.0);
        Ok(())
    }
}

/// `MeridianFlip` — the mount reorientation the scheduler synthesizes when
/// [`crate::services::sky_advisor::SkyVerdict::flip_imminent_within_minutes`]
/// fires. Parameters are grounded in
/// `original_source/.../meridian_flip_task.cpp`.
pub struct MeridianFlipBehavior;

#[async_trait]
impl TaskBehavior for MeridianFlipBehavior {
    async fn execute(&self, ctx: &TaskExecutionContext) -> Result<(), TaskError> {
        let pause_before_flip_secs = ctx.param_f64("pause_before_flip_secs").unwrap_or(30.0);
        let autofocus_after_flip = ctx.param_bool("autofocus_after_flip").unwrap_or(true);
        let platesolve_after_flip = ctx.param_bool("platesolve_after_flip").unwrap_or(true);

        (ctx.progress)(0.0);
        tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(TaskError::Cancelled(uuid::Uuid::nil())),
            () = tokio::time::sleep(Duration::from_secs_f64(pause_before_flip_secs)) => {}
        }
        (ctx.progress)(0.3);

        let ra_hours = ctx.param_f64("ra_hours").unwrap_or(0.0);
        let dec_degrees = ctx.param_f64("dec_degrees").unwrap_or(0.0);
        ctx.device.slew(ra_hours, dec_degrees).await.map_err(device_error)?;
        (ctx.progress)(0.6);

        if platesolve_after_flip {
            ctx.device
                .status(crate::ports::device_gateway::DeviceKind::Camera)
                .await
                .map_err(device_error)?;
        }
        (ctx.progress)(0.8);

        if autofocus_after_flip {
            ctx.device.move_to(0).await.map_err(device_error)?;
        }
        (ctx.progress)(1.0);
        Ok(())
    }
}

fn device_error(source: anyhow::Error) -> TaskError {
    TaskError::Device(source.to_string())
}

fn missing(name: &str) -> TaskError {
    TaskError::InvalidParameter(format!("missing required parameter {name:?}"))
}

/// Build a [`TaskRegistry`] with every built-in behavior registered.
pub fn builtin_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register("Slew", std::sync::Arc::new(SlewBehavior));
    registry.register("TakeExposure", std::sync::Arc::new(TakeExposureBehavior));
    registry.register("PlateSolve", std::sync::Arc::new(PlateSolveBehavior));
    registry.register("MeridianFlip", std::sync::Arc::new(MeridianFlipBehavior));
    registry
}

/// Construct a `Slew` task with its declared parameter schema.
pub fn slew_task(name: impl Into<String>, ra_hours: f64, dec_degrees: f64) -> Task {
    let mut task = Task::new(name, "Slew");
    task.define_parameter("ra_hours", ParameterType::Number, true, None, "target right ascension, hours");
    task.define_parameter("dec_degrees", ParameterType::Number, true, None, "target declination, degrees");
    task.param_values.insert("ra_hours".to_string(), serde_json::json!(ra_hours));
    task.param_values.insert("dec_degrees".to_string(), serde_json::json!(dec_degrees));
    task
}

/// Construct a `TakeExposure` task with its declared parameter schema.
pub fn take_exposure_task(name: impl Into<String>, duration_secs: f64, filter: Option<&str>) -> Task {
    let mut task = Task::new(name, "TakeExposure");
    task.define_parameter("duration_secs", ParameterType::Number, true, None, "exposure duration, seconds");
    task.define_parameter(
        "filter",
        ParameterType::String,
        false,
        None,
        "filter wheel slot to select before exposing",
    );
    task.param_values.insert("duration_secs".to_string(), serde_json::json!(duration_secs));
    if let Some(filter) = filter {
        task.param_values.insert("filter".to_string(), serde_json::json!(filter));
    }
    task
}

/// Construct a `PlateSolve` task.
pub fn plate_solve_task(name: impl Into<String>) -> Task {
    Task::new(name, "PlateSolve")
}

/// Build a [`TaskExecutor`] wired to the built-in registry.
pub fn builtin_task_executor(clock: crate::ports::clock::SharedClock) -> TaskExecutor {
    TaskExecutor::new(std::sync::Arc::new(builtin_registry()), clock)
}
