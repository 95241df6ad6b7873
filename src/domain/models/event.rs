//! Event schema emitted on the internal [`crate::services::event_bus::EventBus`]
//! and relayed to external observers (WebSocket/logging — out of scope here).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event kinds the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    SessionPaused,
    SessionResumed,
    SessionStopped,
    TargetStarted,
    TargetCompleted,
    TargetFailed,
    TargetSkipped,
    TaskStarted,
    TaskProgress,
    TaskCompleted,
    TaskFailed,
    MeridianFlipTriggered,
    WeatherStateChanged,
}

/// Event payload: a closed set matching [`EventKind`] 1:1, carrying the
/// machine-readable detail each event type needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    SessionStarted,
    SessionPaused,
    SessionResumed,
    SessionStopped { reason: String },
    TargetStarted,
    TargetCompleted,
    TargetFailed { kind: crate::domain::errors::ErrorKind, message: String },
    TargetSkipped { reason: String },
    TaskStarted,
    TaskProgress { progress: f32 },
    TaskCompleted,
    TaskFailed {
        kind: crate::domain::errors::ErrorKind,
        message: String,
        attempts: u32,
    },
    MeridianFlipTriggered { flip_offset_minutes: f64 },
    WeatherStateChanged { safe: bool, reasons: Vec<String> },
}

/// A single event on the bus. Every event carries session/target/task
/// context per the spec's event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the `EventBus` on publish; `0` until then. Gives
    /// subscribers a total order independent of wall-clock resolution.
    pub sequence: u64,
    pub event_type: EventKind,
    pub timestamp_ms: i64,
    pub session_id: Uuid,
    pub target_name: Option<String>,
    pub task_id: Option<Uuid>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(
        session_id: Uuid,
        target_name: Option<String>,
        task_id: Option<Uuid>,
        payload: EventPayload,
    ) -> Self {
        let event_type = match &payload {
            EventPayload::SessionStarted => EventKind::SessionStarted,
            EventPayload::SessionPaused => EventKind::SessionPaused,
            EventPayload::SessionResumed => EventKind::SessionResumed,
            EventPayload::SessionStopped { .. } => EventKind::SessionStopped,
            EventPayload::TargetStarted => EventKind::TargetStarted,
            EventPayload::TargetCompleted => EventKind::TargetCompleted,
            EventPayload::TargetFailed { .. } => EventKind::TargetFailed,
            EventPayload::TargetSkipped { .. } => EventKind::TargetSkipped,
            EventPayload::TaskStarted => EventKind::TaskStarted,
            EventPayload::TaskProgress { .. } => EventKind::TaskProgress,
            EventPayload::TaskCompleted => EventKind::TaskCompleted,
            EventPayload::TaskFailed { .. } => EventKind::TaskFailed,
            EventPayload::MeridianFlipTriggered { .. } => EventKind::MeridianFlipTriggered,
            EventPayload::WeatherStateChanged { .. } => EventKind::WeatherStateChanged,
        };
        Self {
            sequence: 0,
            event_type,
            timestamp_ms: Utc::now().timestamp_millis(),
            session_id,
            target_name,
            task_id,
            payload,
        }
    }
}

/// A filter supplied to `subscribe`: `None` matches every event kind.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<EventKind>>,
    pub target_name: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(name) = &self.target_name {
            if event.target_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        true
    }
}
