//! `ExecutionContext` — the single struct threaded through the scheduler,
//! executor, and resource arbiter instead of singleton/global state.
//!
//! Grounded in the teacher's practice of passing an `Arc<AppState>`-style
//! bundle into every application-layer call rather than reaching for
//! process-wide statics.

use std::sync::Arc;

use crate::domain::models::sequence::GlobalPolicy;
use crate::domain::models::weather::{SiteLocation, WeatherLimits, WeatherSnapshot};
use crate::ports::clock::SharedClock;
use crate::ports::device_gateway::DeviceGateway;
use crate::services::event_bus::EventBus;

/// Everything the running session needs besides the target graph itself.
#[derive(Clone)]
pub struct ExecutionContext {
    pub clock: SharedClock,
    pub event_bus: EventBus,
    pub device: Arc<dyn DeviceGateway>,
    pub site: SiteLocation,
    pub weather_limits: WeatherLimits,
    /// Most recent externally-sampled weather reading; updated by the
    /// caller at `GlobalPolicy::weather_poll_interval`.
    pub latest_weather: Arc<std::sync::Mutex<WeatherSnapshot>>,
    pub policy: Arc<std::sync::RwLock<GlobalPolicy>>,
}

impl ExecutionContext {
    pub fn new(
        clock: SharedClock,
        event_bus: EventBus,
        device: Arc<dyn DeviceGateway>,
        site: SiteLocation,
        weather_limits: WeatherLimits,
        initial_weather: WeatherSnapshot,
        policy: GlobalPolicy,
    ) -> Self {
        Self {
            clock,
            event_bus,
            device,
            site,
            weather_limits,
            latest_weather: Arc::new(std::sync::Mutex::new(initial_weather)),
            policy: Arc::new(std::sync::RwLock::new(policy)),
        }
    }

    pub fn policy(&self) -> GlobalPolicy {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    pub fn set_policy(&self, policy: GlobalPolicy) {
        *self.policy.write().expect("policy lock poisoned") = policy;
    }

    pub fn weather(&self) -> WeatherSnapshot {
        *self.latest_weather.lock().expect("weather lock poisoned")
    }

    pub fn set_weather(&self, snapshot: WeatherSnapshot) {
        *self.latest_weather.lock().expect("weather lock poisoned") = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::SystemClock;
    use crate::ports::device_gateway::MockDeviceGateway;
    use chrono::Utc;

    fn sample_weather() -> WeatherSnapshot {
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

    #[test]
    fn policy_and_weather_are_mutable_after_construction() {
        let ctx = ExecutionContext::new(
            Arc::new(SystemClock),
            EventBus::default(),
            Arc::new(MockDeviceGateway::default()),
            SiteLocation::default(),
            WeatherLimits::default(),
            sample_weather(),
            GlobalPolicy::default(),
        );
        let mut policy = ctx.policy();
        policy.max_concurrent_targets = 3;
        ctx.set_policy(policy);
        assert_eq!(ctx.policy().max_concurrent_targets, 3);

        let mut weather = ctx.weather();
        weather.raining = true;
        ctx.set_weather(weather);
        assert!(ctx.weather().raining);
    }
}
