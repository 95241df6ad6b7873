//! Task-type registry: maps a task's `task_type` string to the behavior
//! that runs it. Replaces a polymorphic task class hierarchy with a flat
//! lookup table of named, independently testable behaviors (see the
//! REDESIGN note on the "polymorphic task hierarchy").
//!
//! Grounded in the teacher's `HookRegistry` (a `HashMap` keyed by a closed
//! enum/string, populated at startup, looked up per execution).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::TaskError;
use crate::domain::models::task::ParameterDef;
use crate::ports::device_gateway::DeviceGateway;

/// Reports fractional progress `[0, 1]` back to the owning task. Cheap to
/// clone; the executor wires this to `Task::set_progress` under lock.
pub type ProgressReporter = Arc<dyn Fn(f32) + Send + Sync>;

/// Everything a task behavior needs to run one attempt: resolved
/// parameters, a device handle, a cancellation signal, and a progress
/// sink. Built fresh by the executor for every attempt.
pub struct TaskExecutionContext {
    pub params: HashMap<String, Value>,
    pub device: Arc<dyn DeviceGateway>,
    pub cancellation: CancellationToken,
    pub progress: ProgressReporter,
}

impl TaskExecutionContext {
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(Value::as_f64)
    }

    pub fn param_bool(&self, name: &str) -> Option<bool> {
        self.params.get(name).and_then(Value::as_bool)
    }

    pub fn param_i64(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(Value::as_i64)
    }
}

/// One task type's runtime behavior and declared parameter schema.
#[async_trait]
pub trait TaskBehavior: Send + Sync {
    /// Run this task type to completion or failure. Cooperative
    /// cancellation: implementations should poll `ctx.cancellation` at
    /// natural suspension points and return `TaskError::Cancelled`
    /// promptly once it's triggered.
    async fn execute(&self, ctx: &TaskExecutionContext) -> Result<(), TaskError>;

    /// The parameter schema new tasks of this type should be seeded with.
    /// `Task::define_parameter` calls made from this are additive; callers
    /// may still append task-specific parameters afterward.
    fn parameter_schema(&self) -> Vec<ParameterDef> {
        Vec::new()
    }
}

/// Registry of task-type name to behavior. Stateless lookup after
/// construction; safe to share behind an `Arc` across concurrent target
/// executions.
#[derive(Default)]
pub struct TaskRegistry {
    behaviors: HashMap<String, Arc<dyn TaskBehavior>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self { behaviors: HashMap::new() }
    }

    pub fn register(&mut self, task_type: impl Into<String>, behavior: Arc<dyn TaskBehavior>) {
        self.behaviors.insert(task_type.into(), behavior);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskBehavior>> {
        self.behaviors.get(task_type).cloned()
    }

    pub fn is_registered(&self, task_type: &str) -> bool {
        self.behaviors.contains_key(task_type)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.behaviors.keys().map(String::as_str).collect()
    }
}
