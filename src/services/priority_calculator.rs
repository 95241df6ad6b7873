//! Priority scoring for the `Priority` scheduling strategy.
//!
//! Grounded in the teacher's `PriorityCalculator` (`base + dependency_depth *
//! weight`), adapted to targets: there are no deadlines in this domain, so
//! the deadline-boost term is dropped and ties are broken by insertion order
//! instead (invariant: equal priority falls back to FIFO).

use crate::domain::models::target::Target;

/// Priority formula: `base_priority + dependency_depth * depth_weight`.
#[derive(Debug, Clone, Copy)]
pub struct PriorityCalculator {
    depth_weight: f64,
}

impl Default for PriorityCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityCalculator {
    pub fn new() -> Self {
        Self { depth_weight: 0.5 }
    }

    pub fn with_weight(depth_weight: f64) -> Self {
        Self { depth_weight }
    }

    /// `dependency_depth` is the number of targets that transitively depend
    /// on `target` — targets that unblock more downstream work are nudged
    /// ahead of equal-priority targets that unblock nothing.
    pub fn calculate(&self, target: &Target, dependency_depth: u32) -> f64 {
        target.priority as f64 + dependency_depth as f64 * self.depth_weight
    }

    /// Rank targets highest-score-first, breaking ties by insertion order
    /// (earlier-inserted target wins).
    pub fn rank<'a>(&self, targets: &[&'a Target], depths: &[u32]) -> Vec<&'a Target> {
        let mut scored: Vec<(&Target, f64)> = targets
            .iter()
            .zip(depths.iter())
            .map(|(&t, &depth)| (t, self.calculate(t, depth)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap()
                .then_with(|| a.0.insertion_order.cmp(&b.0.insertion_order))
        });
        scored.into_iter().map(|(t, _)| t).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with(name: &str, priority: u8, insertion_order: u64) -> Target {
        let mut t = Target::new(name);
        t.priority = priority;
        t.insertion_order = insertion_order;
        t
    }

    #[test]
    fn base_priority_only() {
        let calc = PriorityCalculator::new();
        let t = target_with("A", 5, 0);
        assert_eq!(calc.calculate(&t, 0), 5.0);
    }

    #[test]
    fn depth_boosts_priority() {
        let calc = PriorityCalculator::new();
        let t = target_with("A", 5, 0);
        assert_eq!(calc.calculate(&t, 2), 6.0);
    }

    #[test]
    fn rank_breaks_ties_by_insertion_order() {
        let calc = PriorityCalculator::new();
        let a = target_with("A", 5, 1);
        let b = target_with("B", 5, 0);
        let ranked = calc.rank(&[&a, &b], &[0, 0]);
        assert_eq!(ranked[0].name, "B");
        assert_eq!(ranked[1].name, "A");
    }

    #[test]
    fn rank_orders_by_score_descending() {
        let calc = PriorityCalculator::new();
        let a = target_with("A", 3, 0);
        let b = target_with("B", 9, 1);
        let ranked = calc.rank(&[&a, &b], &[0, 0]);
        assert_eq!(ranked[0].name, "B");
    }
}
