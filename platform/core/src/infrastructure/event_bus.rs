// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for committed tank events
//
// In-memory fan-out over a tokio broadcast channel. Only events already
// appended to the event store are published here; a subscriber that misses
// events (lag or restart) recovers by reading the store.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::RecordedEvent;
use crate::domain::repository::{EventPublisher, PublishError};
use crate::domain::tank::TankId;

/// Event bus for publishing and subscribing to committed tank events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RecordedEvent>>,
}

impl EventBus {
    /// Capacity determines how many events can be buffered before slow
    /// receivers start lagging
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Returns the number of receivers that got the event
    pub fn publish_event(&self, event: RecordedEvent) -> usize {
        debug!(
            tank_id = %event.tank_id,
            version = event.version,
            event_type = %event.event.event_type(),
            "Publishing event"
        );

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
        receiver_count
    }

    /// Subscribe to events of every tank
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events of a single tank
    pub fn subscribe_tank(&self, tank_id: TankId) -> TankEventReceiver {
        TankEventReceiver {
            receiver: self.sender.subscribe(),
            tank_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &RecordedEvent) -> Result<(), PublishError> {
        self.publish_event(event.clone());
        Ok(())
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all tank events
pub struct EventReceiver {
    receiver: broadcast::Receiver<RecordedEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<RecordedEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<RecordedEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one tank
pub struct TankEventReceiver {
    receiver: broadcast::Receiver<RecordedEvent>,
    tank_id: TankId,
}

impl TankEventReceiver {
    /// Waits for the next event of the subscribed tank, skipping others
    pub async fn recv(&mut self) -> Result<RecordedEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.tank_id == self.tank_id {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::TankEvent;
    use chrono::Utc;

    fn activated(tank_id: TankId, version: u64) -> RecordedEvent {
        RecordedEvent {
            tank_id,
            version,
            event: TankEvent::TankActivated {
                tank_id,
                occurred_at: Utc::now(),
            },
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let tank_id = TankId::new();
        event_bus.publish(&activated(tank_id, 3)).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.tank_id, tank_id);
        assert_eq!(received.version, 3);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_tank_event_filtering() {
        let event_bus = EventBus::new(10);
        let tank_id = TankId::new();
        let mut receiver = event_bus.subscribe_tank(tank_id);

        event_bus.publish_event(activated(TankId::new(), 2));
        event_bus.publish_event(activated(tank_id, 5));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.tank_id, tank_id);
        assert_eq!(received.version, 5);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        assert_eq!(event_bus.publish_event(activated(TankId::new(), 1)), 2);
        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let event_bus = EventBus::default();
        assert!(event_bus.publish(&activated(TankId::new(), 1)).await.is_ok());
    }
}
