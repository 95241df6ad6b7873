//! Ports: narrow capability interfaces the core depends on but does not
//! implement beyond a test double — device drivers, the clock, and the
//! session persistence format.

pub mod clock;
pub mod device_gateway;
pub mod persistence;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use device_gateway::{DeviceBusy, DeviceGateway, DeviceKind, DeviceStatus, MockDeviceGateway};
pub use persistence::{SequenceSnapshot, SequenceStore};
