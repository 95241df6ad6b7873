//! End-to-end scenario tests mirrored from the testable-properties
//! scenarios: one target per scenario, run through a real
//! `ExposureSequence` over a mock device gateway.

mod support;

use std::time::Duration;

use sequencer_core::builtin_tasks::{slew_task, take_exposure_task};
use sequencer_core::domain::models::event::EventPayload;
use sequencer_core::domain::models::sequence::{GlobalPolicy, RecoveryStrategy, SchedulingStrategy};
use sequencer_core::domain::models::target::{Coordinates, Target, TargetStatus};

async fn drain_until_stopped(
    mut rx: tokio::sync::broadcast::Receiver<sequencer_core::domain::models::event::Event>,
) -> Vec<EventPayload> {
    let mut out = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Ok(event)) => {
                let stop = matches!(event.payload, EventPayload::SessionStopped { .. });
                out.push(event.payload);
                if stop {
                    break;
                }
            }
            _ => break,
        }
    }
    out
}

fn kind_sequence(events: &[EventPayload]) -> Vec<&'static str> {
    events
        .iter()
        .map(|p| match p {
            EventPayload::SessionStarted => "SessionStarted",
            EventPayload::SessionPaused => "SessionPaused",
            EventPayload::SessionResumed => "SessionResumed",
            EventPayload::SessionStopped { .. } => "SessionStopped",
            EventPayload::TargetStarted => "TargetStarted",
            EventPayload::TargetCompleted => "TargetCompleted",
            EventPayload::TargetFailed { .. } => "TargetFailed",
            EventPayload::TargetSkipped { .. } => "TargetSkipped",
            EventPayload::TaskStarted => "TaskStarted",
            EventPayload::TaskProgress { .. } => "TaskProgress",
            EventPayload::TaskCompleted => "TaskCompleted",
            EventPayload::TaskFailed { .. } => "TaskFailed",
            EventPayload::MeridianFlipTriggered { .. } => "MeridianFlipTriggered",
            EventPayload::WeatherStateChanged { .. } => "WeatherStateChanged",
        })
        .collect()
}

/// S1 — single target happy path: Slew then a short exposure, FIFO
/// strategy, runs to completion with progress 1.0.
#[tokio::test]
async fn s1_single_target_happy_path() {
    let (sequence, event_bus) = support::sequence_with_policy(GlobalPolicy {
        scheduling_strategy: SchedulingStrategy::Fifo,
        thread_pool_size: 2,
        ..GlobalPolicy::default()
    });

    let mut m31 = Target::new("M31").with_coordinates(Coordinates::new(0.71, 41.27).unwrap());
    m31.add_task(slew_task("slew", 0.71, 41.27));
    m31.add_task(take_exposure_task("expose", 0.01, None));
    sequence.add_target(m31).await.unwrap();

    let rx = event_bus.subscribe();
    sequence.start().await.unwrap();
    let events = drain_until_stopped(rx).await;
    let kinds = kind_sequence(&events);

    assert_eq!(kinds.first(), Some(&"SessionStarted"));
    assert!(kinds.contains(&"TargetStarted"));
    assert!(kinds.contains(&"TargetCompleted"));
    assert_eq!(kinds.last(), Some(&"SessionStopped"));
    assert_eq!(sequence.target_status("M31").await.unwrap(), TargetStatus::Completed);
    assert!((sequence.progress().await - 1.0).abs() < 1e-6);
}

/// S2 — priority override: B(priority=8) added after A(priority=3), but
/// under `Priority` strategy B is selected first.
#[tokio::test]
async fn s2_priority_override_selects_higher_priority_first() {
    let (sequence, event_bus) = support::sequence_with_policy(GlobalPolicy {
        scheduling_strategy: SchedulingStrategy::Priority,
        thread_pool_size: 1,
        max_concurrent_targets: 1,
        ..GlobalPolicy::default()
    });

    let mut a = Target::new("A").with_priority(3);
    a.add_task(take_exposure_task("expose-a", 0.01, None));
    let mut b = Target::new("B").with_priority(8);
    b.add_task(take_exposure_task("expose-b", 0.01, None));
    sequence.add_target(a).await.unwrap();
    sequence.add_target(b).await.unwrap();

    let mut rx = event_bus.subscribe();
    sequence.start().await.unwrap();

    let mut started_order = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        if matches!(event.payload, EventPayload::TargetStarted) {
            started_order.push(event.target_name.unwrap());
        }
        if matches!(event.payload, EventPayload::SessionStopped { .. }) {
            break;
        }
    }

    assert_eq!(started_order, vec!["B".to_string(), "A".to_string()]);
}

/// S3 — dependency enforcement: A fails (device error, no alternative,
/// recovery Skip), B (deps=[A]) is skipped with a dependency-unmet reason.
#[tokio::test]
async fn s3_dependency_failure_skips_dependent_target() {
    let (sequence, event_bus, device) = support::sequence_with_device(GlobalPolicy {
        scheduling_strategy: SchedulingStrategy::Fifo,
        recovery_strategy: RecoveryStrategy::Skip,
        thread_pool_size: 2,
        ..GlobalPolicy::default()
    });

    let mut a = Target::new("A");
    a.add_task(take_exposure_task("expose-a", 0.01, None));
    let mut b = Target::new("B");
    b.add_task(take_exposure_task("expose-b", 0.01, None));
    b.add_dependency("A");
    sequence.add_target(a).await.unwrap();
    sequence.add_target(b).await.unwrap();

    device.fail_next("camera offline");

    let rx = event_bus.subscribe();
    sequence.start().await.unwrap();
    let events = drain_until_stopped(rx).await;

    let a_failed = events.iter().any(|p| matches!(p, EventPayload::TargetFailed { .. }));
    let b_skipped = events.iter().any(|p| matches!(p, EventPayload::TargetSkipped { .. }));
    assert!(a_failed, "A should report TargetFailed");
    assert!(b_skipped, "B should report TargetSkipped once A fails");
    assert_eq!(sequence.target_status("A").await.unwrap(), TargetStatus::Failed);
    assert_eq!(sequence.target_status("B").await.unwrap(), TargetStatus::Skipped);
}

/// S5 — pause/resume: pausing mid-run stops no new target from starting;
/// resuming lets the session reach completion; state transitions cleanly.
#[tokio::test]
async fn s5_pause_resume_round_trip() {
    let (sequence, _event_bus) = support::sequence_with_policy(GlobalPolicy {
        thread_pool_size: 1,
        max_concurrent_targets: 1,
        ..GlobalPolicy::default()
    });

    let mut a = Target::new("A");
    a.add_task(take_exposure_task("expose-a", 0.05, None));
    let mut b = Target::new("B");
    b.add_task(take_exposure_task("expose-b", 0.01, None));
    sequence.add_target(a).await.unwrap();
    sequence.add_target(b).await.unwrap();

    sequence.start().await.unwrap();
    sequence.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // Nothing should have finished while paused, session stays Paused.
    sequence.resume().await.unwrap();

    // Wait for settle.
    for _ in 0..200 {
        let a_status = sequence.target_status("A").await.unwrap();
        let b_status = sequence.target_status("B").await.unwrap();
        if matches!(a_status, TargetStatus::Completed | TargetStatus::Failed)
            && matches!(b_status, TargetStatus::Completed | TargetStatus::Failed)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sequence.target_status("A").await.unwrap(), TargetStatus::Completed);
    assert_eq!(sequence.target_status("B").await.unwrap(), TargetStatus::Completed);
}

/// S6 — stop with graceful cancel: two targets in flight (the mock device
/// completes exposures almost instantly, so this mainly exercises the
/// grace-then-detach path rather than mid-exposure cancellation itself),
/// `stop()` must return well within `global_timeout / 4`.
#[tokio::test]
async fn s6_stop_cancels_in_flight_targets() {
    let (sequence, _event_bus) = support::sequence_with_policy(GlobalPolicy {
        thread_pool_size: 4,
        max_concurrent_targets: 0,
        global_timeout: Duration::from_secs(4),
        ..GlobalPolicy::default()
    });

    let mut a = Target::new("A");
    a.add_task(take_exposure_task("expose-a", 10.0, None));
    let mut b = Target::new("B");
    b.add_task(take_exposure_task("expose-b", 10.0, None));
    sequence.add_target(a).await.unwrap();
    sequence.add_target(b).await.unwrap();

    sequence.start().await.unwrap();

    let stopped = tokio::time::timeout(Duration::from_secs(2), sequence.stop()).await;
    assert!(stopped.is_ok(), "stop() should return within the grace window");
    stopped.unwrap().unwrap();
}
