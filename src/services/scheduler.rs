//! Target selection: given the target set, the configured
//! [`SchedulingStrategy`], and per-target [`SkyVerdict`]s, decides which
//! target(s) are ready to run next and in what order.
//!
//! Grounded in the teacher's `dag_executor` wave computation (topological
//! readiness) combined with `PriorityCalculator` for tie-breaking, adapted
//! from task-level to target-level selection since tasks within a target
//! always run sequentially (spec §4.4/§4.5).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::sequence::{GlobalPolicy, SchedulingStrategy};
use crate::domain::models::target::Target;
use crate::domain::models::task::{ParameterType, Task};
use crate::domain::models::weather::{SiteLocation, WeatherLimits, WeatherSnapshot};
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::priority_calculator::PriorityCalculator;
use crate::services::sky_advisor::{SkyAdvisor, SkyVerdict};

/// Parameter schema for the synthesized `MeridianFlip` task, grounded in
/// `original_source/.../meridian_flip_task.cpp`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeridianFlipParams {
    pub flip_offset_minutes: f64,
    pub pause_before_flip_secs: f64,
    pub autofocus_after_flip: bool,
    pub platesolve_after_flip: bool,
}

impl Default for MeridianFlipParams {
    fn default() -> Self {
        Self {
            flip_offset_minutes: 5.0,
            pause_before_flip_secs: 30.0,
            autofocus_after_flip: true,
            platesolve_after_flip: true,
        }
    }
}

/// Build the synthesized flip task from its parameter schema. The task type
/// is `"MeridianFlip"`; a behavior for it is registered in `builtin_tasks`.
pub fn meridian_flip_task(params: MeridianFlipParams) -> Task {
    let mut task = Task::new("Meridian flip", "MeridianFlip")
        .with_timeout(Duration::from_secs_f64(params.pause_before_flip_secs + 90.0));
    task.define_parameter(
        "flip_offset_minutes",
        ParameterType::Number,
        false,
        Some(serde_json::json!(params.flip_offset_minutes)),
        "minutes past meridian crossing to trigger the flip",
    );
    task.define_parameter(
        "pause_before_flip_secs",
        ParameterType::Number,
        false,
        Some(serde_json::json!(params.pause_before_flip_secs)),
        "settle time before the flip begins",
    );
    task.define_parameter(
        "autofocus_after_flip",
        ParameterType::Bool,
        false,
        Some(serde_json::json!(params.autofocus_after_flip)),
        "re-run autofocus once the flip completes",
    );
    task.define_parameter(
        "platesolve_after_flip",
        ParameterType::Bool,
        false,
        Some(serde_json::json!(params.platesolve_after_flip)),
        "re-run plate solving once the flip completes",
    );
    task
}

/// A target paired with the sky-condition verdict that made it a
/// candidate for selection this round.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub target: &'a Target,
    pub verdict: SkyVerdict,
}

/// Selects ready targets and orders them per the active [`SchedulingStrategy`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Scheduler {
    resolver: DependencyResolver,
    priority_calc: PriorityCalculator,
    sky_advisor: SkyAdvisor,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            resolver: DependencyResolver::new(),
            priority_calc: PriorityCalculator::new(),
            sky_advisor: SkyAdvisor::new(),
        }
    }

    /// Number of targets that transitively depend on each target, by name.
    /// Used to nudge the `Dependencies` strategy toward targets that unblock
    /// more downstream work.
    pub fn dependency_depths(&self, targets: &[Target]) -> HashMap<String, u32> {
        let depends_on: HashMap<&str, &HashSet<String>> =
            targets.iter().map(|t| (t.name.as_str(), &t.dependencies)).collect();
        let mut depth: HashMap<String, u32> = targets.iter().map(|t| (t.name.clone(), 0)).collect();
        for target in targets {
            for dep in &target.dependencies {
                if let Some(count) = depth.get_mut(dep) {
                    *count += 1;
                }
            }
            // Transitive: walk the dependency chain upward from `target`.
            let mut stack: Vec<&str> = target.dependencies.iter().map(|s| s.as_str()).collect();
            let mut seen: HashSet<&str> = HashSet::new();
            while let Some(node) = stack.pop() {
                if !seen.insert(node) {
                    continue;
                }
                if let Some(grand_deps) = depends_on.get(node) {
                    for grand in grand_deps.iter() {
                        if let Some(count) = depth.get_mut(grand) {
                            *count += 1;
                        }
                        stack.push(grand.as_str());
                    }
                }
            }
        }
        depth
    }

    /// Every target currently ready to run, paired with its sky verdict.
    /// A target whose dependencies are only partially complete is never
    /// included regardless of sky conditions (spec §4.4).
    pub fn candidates<'a>(
        &self,
        targets: &'a [Target],
        completed: &HashSet<String>,
        now: DateTime<Utc>,
        site: SiteLocation,
        weather: &WeatherSnapshot,
        weather_limits: &WeatherLimits,
        policy: &GlobalPolicy,
    ) -> Vec<Candidate<'a>> {
        targets
            .iter()
            .filter_map(|target| {
                let verdict = self.sky_advisor.evaluate(
                    target,
                    now,
                    site,
                    weather,
                    weather_limits,
                    policy.default_min_altitude_degrees,
                    policy.meridian_window_minutes,
                );
                if target.is_ready(completed, verdict.observable) {
                    Some(Candidate { target, verdict })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Order `candidates` per `strategy`, highest-priority-to-run first.
    pub fn order<'a>(
        &self,
        all_targets: &[Target],
        candidates: Vec<Candidate<'a>>,
        strategy: SchedulingStrategy,
    ) -> Vec<Candidate<'a>> {
        match strategy {
            SchedulingStrategy::Fifo => {
                let mut ordered = candidates;
                ordered.sort_by_key(|c| c.target.insertion_order);
                ordered
            }
            SchedulingStrategy::Priority => {
                let targets: Vec<&Target> = candidates.iter().map(|c| c.target).collect();
                let depths = vec![0u32; targets.len()];
                let ranked = self.priority_calc.rank(&targets, &depths);
                reorder_by_ranked(candidates, &ranked)
            }
            SchedulingStrategy::Dependencies => {
                let depths_by_name = self.dependency_depths(all_targets);
                let targets: Vec<&Target> = candidates.iter().map(|c| c.target).collect();
                let depths: Vec<u32> = targets
                    .iter()
                    .map(|t| *depths_by_name.get(&t.name).unwrap_or(&0))
                    .collect();
                let ranked = self.priority_calc.rank(&targets, &depths);
                reorder_by_ranked(candidates, &ranked)
            }
        }
    }

    /// Detect (but do not apply) a dependency cycle before insertion; see
    /// [`DependencyResolver::would_cycle`].
    pub fn would_cycle(&self, targets: &[Target], target: &str, dependency: &str) -> bool {
        self.resolver.would_cycle(targets, target, dependency)
    }

    /// If `verdict` reports an imminent meridian flip and `target` doesn't
    /// already have one queued, synthesize a `MeridianFlip` task and insert
    /// it at the head of the target's remaining (non-terminal) tasks.
    /// Returns `true` if a task was inserted. A single session never
    /// attempts concurrent flips: callers must check their own in-flight
    /// flip tracker (e.g. the target-level executor) before calling this
    /// for more than one running target at a time.
    pub fn maybe_insert_meridian_flip(
        &self,
        target: &mut Target,
        verdict: &SkyVerdict,
        params: MeridianFlipParams,
    ) -> bool {
        if verdict.flip_imminent_within_minutes.is_none() {
            return false;
        }
        let already_queued = target
            .tasks
            .iter()
            .any(|t| t.task_type == "MeridianFlip" && !t.is_terminal());
        if already_queued {
            return false;
        }
        let insert_at = target
            .tasks
            .iter()
            .position(|t| !t.is_terminal())
            .unwrap_or(target.tasks.len());
        target.tasks.insert(insert_at, meridian_flip_task(params));
        true
    }
}

fn reorder_by_ranked<'a>(candidates: Vec<Candidate<'a>>, ranked: &[&'a Target]) -> Vec<Candidate<'a>> {
    let mut by_id: HashMap<_, _> =
        candidates.into_iter().map(|c| (c.target.id, c)).collect();
    ranked.iter().filter_map(|t| by_id.remove(&t.id)).collect()
}
