//! Shared fixtures for the integration suite: a fully-wired
//! `ExposureSequence` over a `MockDeviceGateway`, built the same way
//! `bin/sequencer.rs` builds one, minus config-file loading.

use std::sync::Arc;

use chrono::Utc;
use sequencer_core::builtin_tasks::builtin_task_executor;
use sequencer_core::context::ExecutionContext;
use sequencer_core::domain::models::sequence::GlobalPolicy;
use sequencer_core::domain::models::weather::{SiteLocation, WeatherLimits, WeatherSnapshot};
use sequencer_core::persistence::FileSequenceStore;
use sequencer_core::ports::clock::{ManualClock, SystemClock};
use sequencer_core::ports::device_gateway::MockDeviceGateway;
use sequencer_core::services::event_bus::EventBus;
use sequencer_core::services::executor::TargetExecutor;
use sequencer_core::ExposureSequence;

pub fn clear_weather() -> WeatherSnapshot {
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

/// A session backed by the real clock and a mock device, with the
/// event bus and device handle returned alongside it so tests can
/// subscribe to events or seed device failures/hour-angle readings.
pub fn sequence_with_device(policy: GlobalPolicy) -> (ExposureSequence, EventBus, Arc<MockDeviceGateway>) {
    let device = Arc::new(MockDeviceGateway::new());
    let clock = Arc::new(SystemClock);
    let event_bus = EventBus::default();
    let context = ExecutionContext::new(
        clock.clone(),
        event_bus.clone(),
        device.clone(),
        SiteLocation::default(),
        WeatherLimits::default(),
        clear_weather(),
        policy,
    );
    let task_executor = Arc::new(builtin_task_executor(clock));
    let target_executor = Arc::new(TargetExecutor::new(task_executor));
    let store = Arc::new(FileSequenceStore::new());
    (ExposureSequence::new(context, target_executor, store), event_bus, device)
}

pub fn sequence_with_policy(policy: GlobalPolicy) -> (ExposureSequence, EventBus) {
    let (sequence, event_bus, _device) = sequence_with_device(policy);
    (sequence, event_bus)
}

pub fn sequence() -> (ExposureSequence, EventBus) {
    sequence_with_policy(GlobalPolicy {
        thread_pool_size: 4,
        max_concurrent_targets: 0,
        ..GlobalPolicy::default()
    })
}

/// A session wired to a `ManualClock`, for scenarios that need to force a
/// meridian crossing or a timeout deterministically instead of waiting on
/// wall-clock time.
pub fn sequence_with_manual_clock(
    policy: GlobalPolicy,
) -> (ExposureSequence, EventBus, Arc<ManualClock>, Arc<MockDeviceGateway>) {
    let device = Arc::new(MockDeviceGateway::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let event_bus = EventBus::default();
    let context = ExecutionContext::new(
        clock.clone(),
        event_bus.clone(),
        device.clone(),
        SiteLocation::default(),
        WeatherLimits::default(),
        clear_weather(),
        policy,
    );
    let task_executor = Arc::new(builtin_task_executor(clock.clone()));
    let target_executor = Arc::new(TargetExecutor::new(task_executor));
    let store = Arc::new(FileSequenceStore::new());
    (ExposureSequence::new(context, target_executor, store), event_bus, clock, device)
}
