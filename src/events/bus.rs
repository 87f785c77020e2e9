use super::types::{EventSequence, Notification, PanelEvent, PanelEventPayload};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<PanelEvent>;
pub type EventSender = broadcast::Sender<PanelEvent>;

/// Event bus between the panel and whatever displays it
#[derive(Clone, Debug)]
pub struct PanelEventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl Default for PanelEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl PanelEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number). Having no subscriber is fine.
    pub fn publish(&self, payload: PanelEventPayload) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = PanelEvent {
            sequence,
            timestamp: Utc::now(),
            payload,
        };

        let _ = self.sender.send(event);
        sequence
    }

    pub fn notify(&self, notification: Notification) -> EventSequence {
        self.publish(PanelEventPayload::Notification(notification))
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Sequence number the next event will carry
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotificationLevel;
    use crate::store::Collection;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = PanelEventBus::new(16);
        let mut rx = bus.subscribe();

        let seq = bus.notify(Notification::success("Watcher saved successfully"));
        assert_eq!(seq, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sequence, 1);
        assert_eq!(event.payload_type(), "notification");
        let notification = event.notification().unwrap();
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.message, "Watcher saved successfully");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = PanelEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        bus.publish(PanelEventPayload::Refreshed {
            collection: Collection::Watchers,
            count: 3,
        });

        let event1 = rx1.recv().await.unwrap();
        let event2 = rx2.recv().await.unwrap();
        assert_eq!(event1.sequence, event2.sequence);
        assert_eq!(event1.payload_type(), "refreshed");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = PanelEventBus::new(16);
        assert_eq!(bus.publish(PanelEventPayload::FormChanged), 1);
        assert_eq!(bus.publish(PanelEventPayload::ViewChanged), 2);
        assert_eq!(bus.current_sequence(), 3);
    }
}
