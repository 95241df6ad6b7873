//! `DeviceGateway` — the narrow capability interface through which the
//! core drives hardware. Device protocols themselves are out of scope
//! (spec §1); this crate only fixes the contract and ships a mock for
//! tests. Device handles are single-writer: at most one task per device at
//! a time, enforced by the gateway implementation, not the core.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which physical subsystem a gateway call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Mount,
    Camera,
    Focuser,
    FilterWheel,
    Guider,
}

/// Connection/activity status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Disconnected,
    Idle,
    Busy,
    Error,
}

/// Raised when two tasks attempt to use the same device concurrently.
#[derive(Debug, thiserror::Error)]
#[error("device {0:?} is already in use")]
pub struct DeviceBusy(pub DeviceKind);

/// The capability surface the core consumes. Each call is fallible with an
/// `anyhow::Error`, which the task executor maps to `ErrorKind::DeviceError`.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn connect(&self, device: DeviceKind) -> anyhow::Result<()>;
    async fn disconnect(&self, device: DeviceKind) -> anyhow::Result<()>;
    async fn status(&self, device: DeviceKind) -> anyhow::Result<DeviceStatus>;

    /// Slew the mount to the given coordinates.
    async fn slew(&self, ra_hours: f64, dec_degrees: f64) -> anyhow::Result<()>;

    /// Expose the camera for `duration`, returning an opaque frame
    /// reference (e.g. a file path or frame id) on success.
    async fn expose(&self, duration: Duration) -> anyhow::Result<String>;

    /// Move the focuser to an absolute position.
    async fn move_to(&self, position: i32) -> anyhow::Result<()>;

    /// Select a filter by name.
    async fn set_filter(&self, name: &str) -> anyhow::Result<()>;

    /// Start the guider; returns once guiding has locked on, or errors.
    async fn start_guiding(&self) -> anyhow::Result<()>;

    /// Report the mount's current hour angle, used by the scheduler's
    /// meridian-flip check. Hour angle is in hours, negative = east of
    /// meridian, positive = west.
    async fn hour_angle(&self, ra_hours: f64) -> anyhow::Result<f64>;
}

/// A deterministic in-memory `DeviceGateway` for tests and demos. Every
/// operation succeeds immediately unless pre-seeded to fail via
/// [`MockDeviceGateway::fail_next`].
pub struct MockDeviceGateway {
    fail_next: std::sync::Mutex<Option<String>>,
    hour_angle: std::sync::Mutex<f64>,
}

impl Default for MockDeviceGateway {
    fn default() -> Self {
        Self {
            fail_next: std::sync::Mutex::new(None),
            hour_angle: std::sync::Mutex::new(-1.0),
        }
    }
}

impl MockDeviceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next gateway call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }

    /// Set the hour angle `hour_angle()` reports, to drive meridian-flip
    /// scenario tests.
    pub fn set_hour_angle(&self, value: f64) {
        *self.hour_angle.lock().unwrap() = value;
    }

    fn maybe_fail(&self) -> anyhow::Result<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            anyhow::bail!(message);
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceGateway for MockDeviceGateway {
    async fn connect(&self, _device: DeviceKind) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn disconnect(&self, _device: DeviceKind) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn status(&self, _device: DeviceKind) -> anyhow::Result<DeviceStatus> {
        self.maybe_fail()?;
        Ok(DeviceStatus::Idle)
    }

    async fn slew(&self, _ra_hours: f64, _dec_degrees: f64) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn expose(&self, duration: Duration) -> anyhow::Result<String> {
        self.maybe_fail()?;
        tokio::time::sleep(duration.min(Duration::from_millis(5))).await;
        Ok(format!("frame-{}ms", duration.as_millis()))
    }

    async fn move_to(&self, _position: i32) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn set_filter(&self, _name: &str) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn start_guiding(&self) -> anyhow::Result<()> {
        self.maybe_fail()
    }

    async fn hour_angle(&self, _ra_hours: f64) -> anyhow::Result<f64> {
        self.maybe_fail()?;
        Ok(*self.hour_angle.lock().unwrap())
    }
}
