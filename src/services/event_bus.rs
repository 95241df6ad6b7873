//! Central event bus: broadcasts [`Event`]s to every subscriber, stamping
//! each with a monotonically increasing sequence number.
//!
//! Grounded in the teacher's `EventBus` (`tokio::sync::broadcast` plus an
//! `AtomicU64` sequence counter); filtered subscription and persistence
//! (event store) are dropped as out of scope for this core.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::domain::models::event::{Event, EventFilter};

#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

/// Broadcast-backed event bus. Cloning an `EventBus` shares the same
/// underlying channel and sequence counter.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: std::sync::Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self { sender, sequence: std::sync::Arc::new(AtomicU64::new(0)) }
    }

    /// Publish an event, stamping it with the next sequence number and
    /// broadcasting it to all current subscribers. A send with no
    /// subscribers is not an error.
    pub fn publish(&self, mut event: Event) {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(event);
    }

    /// Subscribe to the raw event stream; filtering happens client-side via
    /// [`FilteredSubscription`].
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied: the returned receiver yields only
    /// events that match. Per-subscriber delivery order is preserved
    /// (broadcast channels are FIFO per receiver).
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredSubscription {
        FilteredSubscription { inner: self.sender.subscribe(), filter }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

/// A subscription that skips events not matching its filter.
pub struct FilteredSubscription {
    inner: broadcast::Receiver<Event>,
    filter: EventFilter,
}

impl FilteredSubscription {
    /// Await the next matching event, skipping any that don't match.
    /// Returns `Err` once the channel is closed or this subscriber has
    /// lagged past the buffer (`RecvError::Lagged`).
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        loop {
            let event = self.inner.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::EventKind;
    use crate::domain::models::event::EventPayload;
    use uuid::Uuid;

    #[tokio::test]
    async fn sequence_numbers_increase_monotonically() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let session_id = Uuid::new_v4();

        bus.publish(Event::new(session_id, None, None, EventPayload::SessionStarted));
        bus.publish(Event::new(session_id, None, None, EventPayload::SessionPaused));

        let e1 = rx.recv().await.unwrap();
        let e2 = rx.recv().await.unwrap();
        assert!(e2.sequence > e1.sequence);
    }

    #[tokio::test]
    async fn filtered_subscription_skips_non_matching_kinds() {
        let bus = EventBus::default();
        let session_id = Uuid::new_v4();
        let mut sub = bus.subscribe_filtered(EventFilter {
            kinds: Some(vec![EventKind::TaskFailed]),
            target_name: None,
        });

        bus.publish(Event::new(session_id, None, None, EventPayload::SessionStarted));
        bus.publish(Event::new(
            session_id,
            None,
            None,
            EventPayload::TaskFailed {
                kind: crate::domain::errors::ErrorKind::Timeout,
                message: "boom".to_string(),
                attempts: 1,
            },
        ));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, EventKind::TaskFailed);
    }

    #[tokio::test]
    async fn filtered_subscription_matches_target_name() {
        let bus = EventBus::default();
        let session_id = Uuid::new_v4();
        let mut sub = bus.subscribe_filtered(EventFilter {
            kinds: None,
            target_name: Some("M31".to_string()),
        });

        bus.publish(Event::new(
            session_id,
            Some("M42".to_string()),
            None,
            EventPayload::TargetStarted,
        ));
        bus.publish(Event::new(
            session_id,
            Some("M31".to_string()),
            None,
            EventPayload::TargetStarted,
        ));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.target_name.as_deref(), Some("M31"));
    }
}
