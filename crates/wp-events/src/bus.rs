use crate::types::EventRecord;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Opens a session-scoped subscription to one recipient group's topic.
    /// Dropping the returned handle disconnects the session.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        Subscription {
            topic: topic.into(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribes to every topic. Used by in-process rules rather than UI sessions.
    pub fn subscribe_all(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Fire-and-forget: never waits on subscribers. Returns how many sessions
    /// were connected when the record was queued.
    pub fn publish(&self, event: EventRecord) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<EventRecord>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next record addressed to this session's topic. `None` once the bus is gone.
    ///
    /// A session that falls behind skips what it missed; the live channel only
    /// signals clients to refresh, so nothing is replayed.
    pub async fn recv(&mut self) -> Option<EventRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.is_for(&self.topic) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "live session lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Same filtering as [`Subscription::recv`], as a stream for SSE bodies.
    pub fn into_stream(self) -> impl Stream<Item = EventRecord> + Send + 'static {
        let topic = self.topic;
        BroadcastStream::new(self.receiver).filter_map(move |item| match item {
            Ok(event) if event.is_for(&topic) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(topic = %topic, skipped, "live session lagged");
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BROADCAST_TOPIC, EventSource};
    use chrono::Utc;
    use serde_json::json;

    fn record(topic: &str, seq: i64) -> EventRecord {
        EventRecord {
            id: format!("evt_{seq}"),
            seq,
            at: Utc::now(),
            correlation_id: None,
            source: EventSource::System,
            topic: topic.to_string(),
            body: json!({ "type": "checkin_requested" }),
        }
    }

    #[tokio::test]
    async fn subscription_only_sees_its_topic() {
        let bus = EventBus::new(16);
        let mut office = bus.subscribe("shipping-office");
        bus.publish(record("yard", 1));
        bus.publish(record("shipping-office", 2));
        bus.publish(record(BROADCAST_TOPIC, 3));

        assert_eq!(office.recv().await.map(|e| e.seq), Some(2));
        assert_eq!(office.recv().await.map(|e| e.seq), Some(3));
    }

    #[tokio::test]
    async fn each_session_gets_each_record_once() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe("shipping-office");
        let mut b = bus.subscribe("shipping-office");
        assert_eq!(bus.publish(record("shipping-office", 7)), 2);

        assert_eq!(a.recv().await.map(|e| e.seq), Some(7));
        assert_eq!(b.recv().await.map(|e| e.seq), Some(7));
        assert!(a.receiver.try_recv().is_err());
    }

    #[test]
    fn publish_without_sessions_does_not_fail() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(record("shipping-office", 1)), 0);
    }

    #[tokio::test]
    async fn stream_filters_by_topic() {
        let bus = EventBus::new(16);
        let mut stream = Box::pin(bus.subscribe("yard").into_stream());
        bus.publish(record("shipping-office", 1));
        bus.publish(record("yard", 2));
        assert_eq!(stream.next().await.map(|e| e.seq), Some(2));
    }

    #[tokio::test]
    async fn dropped_session_disconnects() {
        let bus = EventBus::new(4);
        let session = bus.subscribe("shipping-office");
        assert_eq!(bus.session_count(), 1);
        drop(session);
        assert_eq!(bus.session_count(), 0);
    }
}
