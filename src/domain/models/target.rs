//! Target domain model — a named observing goal: an ordered task list plus
//! coordinates, priority, dependencies, and alternative fallback targets.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;

/// Equatorial coordinates. RA is in hours `[0, 24)`, Dec in degrees
/// `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub ra_hours: f64,
    pub dec_degrees: f64,
}

impl Coordinates {
    pub fn new(ra_hours: f64, dec_degrees: f64) -> Result<Self, String> {
        if !(0.0..24.0).contains(&ra_hours) {
            return Err(format!("ra_hours {ra_hours} out of range [0, 24)"));
        }
        if !(-90.0..=90.0).contains(&dec_degrees) {
            return Err(format!("dec_degrees {dec_degrees} out of range [-90, 90]"));
        }
        Ok(Self { ra_hours, dec_degrees })
    }
}

/// Lifecycle status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// An ordered list of tasks plus observing metadata.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub tasks: Vec<Task>,
    pub priority: u8,
    pub enabled: bool,
    pub timeout: Option<Duration>,
    pub coordinates: Option<Coordinates>,
    /// Names of targets that must reach `Completed` before this one is ready.
    pub dependencies: HashSet<String>,
    /// Ordered fallback targets, tried in order if this target fails and
    /// the recovery strategy is `Alternative`. Per the spec's Open Question
    /// decision, alternatives inherit this target's dependency set.
    pub alternatives: Vec<Target>,
    pub status: TargetStatus,
    /// Insertion order into the owning sequence; used for FIFO and as the
    /// Priority-strategy tie-break. Set once by the sequence on `addTarget`.
    pub insertion_order: u64,
    /// Minimum altitude override for the sky advisor (degrees). `None`
    /// falls back to the session default.
    pub min_altitude_degrees: Option<f64>,
    /// Set to `true` once this target has entered `InProgress`. A target
    /// enters `InProgress` at most once unless explicitly retried (invariant
    /// guard for "a target enters InProgress at most once").
    pub has_run: bool,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tasks: Vec::new(),
            priority: 5,
            enabled: true,
            timeout: None,
            coordinates: None,
            dependencies: HashSet::new(),
            alternatives: Vec::new(),
            status: TargetStatus::default(),
            insertion_order: 0,
            min_altitude_degrees: None,
            has_run: false,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn remove_task(&mut self, task_id: Uuid) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == task_id)?;
        Some(self.tasks.remove(pos))
    }

    pub fn reorder_tasks(&mut self, order: &[Uuid]) -> Result<(), String> {
        if order.len() != self.tasks.len() {
            return Err("reorder must include every task exactly once".to_string());
        }
        let mut reordered = Vec::with_capacity(self.tasks.len());
        for id in order {
            let pos = self
                .tasks
                .iter()
                .position(|t| t.id == *id)
                .ok_or_else(|| format!("unknown task id {id}"))?;
            reordered.push(self.tasks[pos].clone());
        }
        self.tasks = reordered;
        Ok(())
    }

    pub fn add_dependency(&mut self, target_name: impl Into<String>) {
        self.dependencies.insert(target_name.into());
    }

    pub fn remove_dependency(&mut self, target_name: &str) {
        self.dependencies.remove(target_name);
    }

    pub fn add_alternative(&mut self, mut alternative: Target) {
        // Open Question default: alternatives inherit the original
        // target's dependency set.
        alternative.dependencies.extend(self.dependencies.iter().cloned());
        self.alternatives.push(alternative);
    }

    /// A target is ready iff: Pending, enabled, every dependency is
    /// Completed, and the sky advisor reports observable. Cycle rejection
    /// happens at insertion time (see
    /// [`crate::services::dependency_resolver::DependencyResolver`]), not
    /// here.
    pub fn is_ready(&self, completed_targets: &HashSet<String>, observable: bool) -> bool {
        self.status == TargetStatus::Pending
            && self.enabled
            && self.dependencies.iter().all(|d| completed_targets.contains(d))
            && observable
    }

    /// Whether completion criteria are met: every contained task is
    /// `Completed` or `Skipped`.
    pub fn tasks_satisfy_completion(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .iter()
                .all(|t| matches!(t.status(), super::task::TaskStatus::Completed | super::task::TaskStatus::Skipped))
    }
}
