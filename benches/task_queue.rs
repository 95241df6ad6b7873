//! Benchmarks scheduler target selection: building the ready set from a
//! target graph and ordering it under each `SchedulingStrategy`.

use std::collections::HashSet;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
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

fn chain(count: usize) -> Vec<Target> {
    (0..count)
        .map(|i| {
            let mut t = Target::new(format!("target-{i}"));
            t.priority = (i % 10) as u8;
            t.insertion_order = i as u64;
            if i > 0 {
                t.add_dependency(format!("target-{}", i - 1));
            }
            t
        })
        .collect()
}

fn bench_candidate_selection(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let weather = clear_weather();
    let limits = WeatherLimits::default();
    let policy = GlobalPolicy::default();
    let mut group = c.benchmark_group("scheduler_candidates");

    for &size in &[10usize, 100, 1_000] {
        let targets = chain(size);
        let completed: HashSet<String> = HashSet::new();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let candidates = scheduler.candidates(
                    &targets,
                    &completed,
                    Utc::now(),
                    SiteLocation::default(),
                    &weather,
                    &limits,
                    &policy,
                );
                black_box(scheduler.order(&targets, candidates, SchedulingStrategy::Dependencies))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_candidate_selection);
criterion_main!(benches);
