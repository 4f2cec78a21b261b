// Lifecycle event fan-out
//
// The core publishes order and delivery lifecycle events to an in-process
// broadcast channel. Subscribers (socket gateways, notification dispatch)
// attach via `subscribe`. The channel is lossy by design: a dropped or
// lagging receiver never affects the persisted state that produced the event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::deliveries::DeliveryStatus;
use crate::orders::OrderStatus;

/// Events emitted by the order and delivery cores
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        customer_id: i32,
        restaurant_id: Uuid,
        total_amount: Decimal,
        timestamp: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        customer_id: i32,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    DeliveryLocationUpdated {
        delivery_id: Uuid,
        order_id: Uuid,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    },
    DeliveryStatusChanged {
        delivery_id: Uuid,
        order_id: Uuid,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus shared through application state
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    ///
    /// Fire-and-forget: an error just means nobody is listening right now.
    pub fn publish(&self, event: AppEvent) {
        tracing::debug!("Publishing event: {:?}", event);
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(AppEvent::OrderStatusChanged {
            order_id: Uuid::new_v4(),
            customer_id: 1,
            status: OrderStatus::Confirmed,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.expect("event should be delivered");
        assert!(matches!(event, AppEvent::OrderStatusChanged { .. }));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(AppEvent::DeliveryLocationUpdated {
            delivery_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            latitude: 12.97,
            longitude: 77.59,
            timestamp: Utc::now(),
        });
    }
}
