//! Dependency graph utilities: cycle detection, topological sort, and
//! readiness queries over a set of [`Target`]s keyed by name.
//!
//! Grounded in the teacher's `DagNode`/`TaskDag` topological-sort shape
//! (wave-based execution, Kahn's algorithm), adapted to operate over
//! target *names* rather than task UUIDs since the spec's dependency
//! relation is `Target -> Vec<Target name>`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::models::target::Target;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DependencyError {
    #[error("adding dependency {dependency:?} to {target:?} would introduce a cycle")]
    CycleRejected { target: String, dependency: String },
    #[error("unknown target referenced: {0}")]
    UnknownTarget(String),
}

/// Stateless resolver over a borrowed target set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    fn graph<'a>(targets: &'a [Target]) -> HashMap<&'a str, &'a HashSet<String>> {
        targets.iter().map(|t| (t.name.as_str(), &t.dependencies)).collect()
    }

    /// Whether adding `dependency` as a dependency of `target` (both
    /// identified by name) would introduce a cycle, considering the
    /// existing target set. Adding a dependency that would introduce a
    /// cycle must be rejected and must leave the graph unchanged
    /// (invariant 1); this is a pure check, callers apply the mutation
    /// only if it returns `Ok`.
    pub fn would_cycle(&self, targets: &[Target], target: &str, dependency: &str) -> bool {
        if target == dependency {
            return true;
        }
        let graph = Self::graph(targets);
        // Cycle iff `dependency` (transitively) depends on `target`.
        let mut stack = vec![dependency];
        let mut visited = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(deps) = graph.get(node) {
                stack.extend(deps.iter().map(|s| s.as_str()));
            }
        }
        false
    }

    /// Detect any cycle in the current target set, returning the first
    /// cycle found as a list of target names.
    pub fn detect_cycle(&self, targets: &[Target]) -> Option<Vec<String>> {
        let graph = Self::graph(targets);
        let mut visited: HashSet<&str> = HashSet::new();
        let mut rec_stack: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            graph: &HashMap<&'a str, &'a HashSet<String>>,
            visited: &mut HashSet<&'a str>,
            rec_stack: &mut HashSet<&'a str>,
            path: &mut Vec<&'a str>,
        ) -> bool {
            visited.insert(node);
            rec_stack.insert(node);
            path.push(node);
            if let Some(deps) = graph.get(node) {
                for dep in deps.iter() {
                    let dep = dep.as_str();
                    if !visited.contains(dep) {
                        if dfs(dep, graph, visited, rec_stack, path) {
                            return true;
                        }
                    } else if rec_stack.contains(dep) {
                        return true;
                    }
                }
            }
            rec_stack.remove(node);
            path.pop();
            false
        }

        for &name in graph.keys() {
            if !visited.contains(name) && dfs(name, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Some(path.iter().map(|s| s.to_string()).collect());
            }
        }
        None
    }

    /// Topological order over the dependency DAG (Kahn's algorithm).
    /// Returns an error if a cycle is present.
    pub fn topological_order(&self, targets: &[Target]) -> Result<Vec<String>, DependencyError> {
        let names: HashSet<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        let mut in_degree: HashMap<&str, usize> = names.iter().map(|&n| (n, 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for target in targets {
            for dep in &target.dependencies {
                if !names.contains(dep.as_str()) {
                    return Err(DependencyError::UnknownTarget(dep.clone()));
                }
                *in_degree.get_mut(target.name.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(target.name.as_str());
            }
        }

        // Stable order for ties: seed directly from insertion order.
        let mut ordered_queue: VecDeque<&str> = VecDeque::new();
        for target in targets {
            if in_degree[target.name.as_str()] == 0 {
                ordered_queue.push_back(target.name.as_str());
            }
        }

        let mut result = Vec::with_capacity(targets.len());
        while let Some(node) = ordered_queue.pop_front() {
            result.push(node.to_string());
            if let Some(deps) = dependents.get(node) {
                for &dependent in deps {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ordered_queue.push_back(dependent);
                    }
                }
            }
        }

        if result.len() != targets.len() {
            return Err(DependencyError::CycleRejected {
                target: "<graph>".to_string(),
                dependency: "<cycle>".to_string(),
            });
        }
        Ok(result)
    }
}
