//! Property tests for the scheduler's ordering invariant (invariant 9):
//! under `Priority`, ties broken by insertion order, strictly higher
//! priority always sorts ahead of strictly lower priority.

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use sequencer_core::domain::models::sequence::{GlobalPolicy, SchedulingStrategy};
use sequencer_core::domain::models::target::Target;
use sequencer_core::domain::models::weather::{SiteLocation, WeatherLimits, WeatherSnapshot};
use sequencer_core::services::scheduler::Scheduler;

fn clear_weather() -> WeatherSnapshot {
    WeatherSnapshot {
        sampled_at: Utc::now(),
        cloud_cover_percent: 0.0,
        wind_speed_kmh: 0.0,
        humidity_percent: 10.0,
        temperature_c: 15.0,
        dew_point_c: 2.0,
        raining: false,
    }
}

proptest! {
    /// Property: for any set of targets with distinct priorities and no
    /// dependency edges, `Priority` ordering is a strict descending sort by
    /// priority.
    #[test]
    fn prop_priority_strategy_orders_by_priority_desc(
        priorities in prop::collection::hash_set(0u8..=250, 2..15)
    ) {
        let scheduler = Scheduler::new();
        let weather = clear_weather();
        let limits = WeatherLimits::default();
        let policy = GlobalPolicy { scheduling_strategy: SchedulingStrategy::Priority, ..GlobalPolicy::default() };

        let mut priorities: Vec<u8> = priorities.into_iter().collect();
        let targets: Vec<Target> = priorities
            .drain(..)
            .enumerate()
            .map(|(i, p)| {
                let mut t = Target::new(format!("target-{i}"));
                t.priority = p;
                t.insertion_order = i as u64;
                t
            })
            .collect();

        let completed: HashSet<String> = HashSet::new();
        let candidates = scheduler.candidates(
            &targets,
            &completed,
            Utc::now(),
            SiteLocation::default(),
            &weather,
            &limits,
            &policy,
        );
        let ordered = scheduler.order(&targets, candidates, SchedulingStrategy::Priority);

        for pair in ordered.windows(2) {
            prop_assert!(
                pair[0].target.priority >= pair[1].target.priority,
                "{} (priority {}) should not be ranked after {} (priority {})",
                pair[0].target.name, pair[0].target.priority,
                pair[1].target.name, pair[1].target.priority
            );
        }
        // Every target with no dependencies and no sky constraints is a
        // candidate.
        prop_assert_eq!(ordered.len(), targets.len());
    }

    /// Property: under `Fifo`, ordering always matches ascending insertion
    /// order regardless of priority.
    #[test]
    fn prop_fifo_strategy_orders_by_insertion(size in 2usize..20) {
        let scheduler = Scheduler::new();
        let weather = clear_weather();
        let limits = WeatherLimits::default();
        let policy = GlobalPolicy { scheduling_strategy: SchedulingStrategy::Fifo, ..GlobalPolicy::default() };

        let targets: Vec<Target> = (0..size)
            .map(|i| {
                let mut t = Target::new(format!("target-{i}"));
                t.priority = ((size - i) % 10) as u8;
                t.insertion_order = i as u64;
                t
            })
            .collect();

        let completed: HashSet<String> = HashSet::new();
        let candidates = scheduler.candidates(
            &targets, &completed, Utc::now(), SiteLocation::default(), &weather, &limits, &policy,
        );
        let ordered = scheduler.order(&targets, candidates, SchedulingStrategy::Fifo);

        let order_values: Vec<u64> = ordered.iter().map(|c| c.target.insertion_order).collect();
        let mut sorted = order_values.clone();
        sorted.sort_unstable();
        prop_assert_eq!(order_values, sorted);
    }

    /// Property: a target whose dependencies are not all completed is never
    /// a candidate, regardless of scheduling strategy or sky conditions.
    #[test]
    fn prop_unmet_dependency_excludes_from_candidates(size in 1usize..15) {
        let scheduler = Scheduler::new();
        let weather = clear_weather();
        let limits = WeatherLimits::default();
        let policy = GlobalPolicy::default();

        let mut blocker = Target::new("blocker");
        blocker.insertion_order = 0;
        let mut targets = vec![blocker];
        for i in 0..size {
            let mut t = Target::new(format!("target-{i}"));
            t.insertion_order = (i + 1) as u64;
            t.add_dependency("blocker");
            targets.push(t);
        }

        // Nothing is completed, so `blocker` is the only candidate.
        let completed: HashSet<String> = HashSet::new();
        let candidates = scheduler.candidates(
            &targets, &completed, Utc::now(), SiteLocation::default(), &weather, &limits, &policy,
        );
        prop_assert_eq!(candidates.len(), 1);
        prop_assert_eq!(candidates[0].target.name.as_str(), "blocker");
    }
}
