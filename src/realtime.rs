//! Topic-keyed event fan-out on top of tokio broadcast channels.
//!
//! Delivery is at-most-once: subscribers only see events published after
//! they attached, and a slow subscriber that falls behind the channel
//! capacity skips ahead rather than stalling publishers.

use crate::conversations::MessageView;
use crate::notifications::NotificationView;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const TOPIC_CAPACITY: usize = 256;
pub const ENVELOPE_VERSION: u8 = 1;

pub fn conversation_topic(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}")
}

pub fn user_topic(user_id: &str) -> String {
    format!("user:{user_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub version: u8,
    pub topic: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    MessageCreated(MessageView),
    NotificationCreated(NotificationView),
}

impl EventEnvelope {
    pub fn new(topic: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            topic: topic.into(),
            payload,
        }
    }
}

/// Routes events to whoever is subscribed to their topic at publish time.
/// Publishing to a topic with no subscribers drops the event.
#[derive(Clone, Default)]
pub struct FanoutRouter {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>>,
}

impl FanoutRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, envelope: EventEnvelope) {
        let mut topics = self.topics.write().await;
        let Some(sender) = topics.get(&envelope.topic) else {
            return;
        };
        if sender.receiver_count() == 0 {
            topics.remove(&envelope.topic);
            return;
        }
        let topic = envelope.topic.clone();
        if sender.send(envelope).is_err() {
            topics.remove(&topic);
        }
    }

    pub async fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.topics.write().await;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Subscription {
            topic: topic.to_string(),
            receiver: sender.subscribe(),
        }
    }
}

pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl Subscription {
    /// Next event on the topic, or `None` once the topic is closed. A lagged
    /// receiver logs and resumes from the oldest retained event.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "subscriber lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = EventEnvelope> {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|envelope| (envelope, sub))
        })
    }
}
