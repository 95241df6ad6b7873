//! Benchmarks the `Priority` scheduling strategy's ranking pass: scoring
//! and sorting a target set by `(priority, dependency_depth)`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sequencer_core::domain::models::target::Target;
use sequencer_core::services::priority_calculator::PriorityCalculator;

fn targets(count: usize) -> Vec<Target> {
    (0..count)
        .map(|i| {
            let mut t = Target::new(format!("target-{i}"));
            t.priority = (i % 10) as u8;
            t.insertion_order = i as u64;
            t
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let calc = PriorityCalculator::new();
    let mut group = c.benchmark_group("priority_rank");
    for &size in &[10usize, 100, 1_000] {
        let pool = targets(size);
        let refs: Vec<&Target> = pool.iter().collect();
        let depths: Vec<u32> = (0..size as u32).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(calc.rank(&refs, &depths)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
