//! Clock abstraction.
//!
//! The executor and scheduler depend on `Clock` rather than calling
//! `chrono::Utc::now()`/`tokio::time::Instant::now()` directly, so tests can
//! inject deterministic or scriptable time (e.g. to simulate a sidereal
//! crossing for meridian-flip scenario S4) without real sleeps. Replaces
//! the singleton clock pattern per the spec's design notes.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually-advanced clock for deterministic tests.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { inner: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.inner.lock().expect("clock mutex poisoned");
        *guard = *guard + delta;
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *self.inner.lock().expect("clock mutex poisoned") = value;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().expect("clock mutex poisoned")
    }
}

pub type SharedClock = Arc<dyn Clock>;
