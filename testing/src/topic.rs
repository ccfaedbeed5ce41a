//! In-memory event topic.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::failure::FailureSwitch;
use order_pipeline_core::event_topic::{EventTopic, TopicError};
use order_pipeline_core::message::Message;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// [`EventTopic`] fake that captures published messages.
///
/// `published()` keeps the full history for assertions; `drain()` hands
/// undelivered messages to a subscriber (the local pump does this).
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventTopic {
    published: Arc<Mutex<Vec<Message>>>,
    undelivered: Arc<Mutex<Vec<Message>>>,
    failures: Arc<FailureSwitch>,
}

impl InMemoryEventTopic {
    /// Create an empty topic
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message published so far.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.published.lock().unwrap().clone()
    }

    /// Published messages carrying `eventType = event_type`.
    #[must_use]
    pub fn published_of_type(&self, event_type: &str) -> Vec<Message> {
        self.published()
            .into_iter()
            .filter(|m| m.attribute("eventType") == Some(event_type))
            .collect()
    }

    /// Take messages not yet handed to a subscriber.
    #[must_use]
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.undelivered.lock().unwrap())
    }

    /// Fail the next `count` publishes.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failures.fail_next(count);
    }

    /// Fail every publish until [`InMemoryEventTopic::heal`].
    pub fn fail_all_publishes(&self) {
        self.failures.fail_always();
    }

    /// Clear injected failures.
    pub fn heal(&self) {
        self.failures.reset();
    }
}

impl EventTopic for InMemoryEventTopic {
    fn publish(
        &self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), TopicError>> + Send + '_>> {
        Box::pin(async move {
            if self.failures.trip() {
                return Err(TopicError::PublishFailed {
                    message_id: message.message_id,
                    reason: "injected publish failure".to_string(),
                });
            }
            self.published.lock().unwrap().push(message.clone());
            self.undelivered.lock().unwrap().push(message);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_empties_only_undelivered() {
        let topic = InMemoryEventTopic::new();
        let message = Message::new("e-1".to_string(), "{}".to_string())
            .with_attribute("eventType", "ORDER_CONFIRMED");
        topic.publish(message).await.unwrap();

        assert_eq!(topic.drain().len(), 1);
        assert!(topic.drain().is_empty());
        assert_eq!(topic.published_of_type("ORDER_CONFIRMED").len(), 1);
    }

    #[tokio::test]
    async fn failed_publish_is_not_recorded() {
        let topic = InMemoryEventTopic::new();
        topic.fail_next_publishes(1);
        let result = topic
            .publish(Message::new("e-1".to_string(), "{}".to_string()))
            .await;
        assert!(matches!(result, Err(TopicError::PublishFailed { .. })));
        assert!(topic.published().is_empty());
    }
}
