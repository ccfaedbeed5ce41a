//! Event topic abstraction for order lifecycle events.
//!
//! The batch processor publishes one event each time an order reaches a
//! terminal status. Subscribers (the notification dispatcher among them)
//! receive copies at least once and must tolerate duplicates.
//!
//! ```text
//! ┌─────────────────┐
//! │ 1. Update Order │◄─── Source of truth
//! │   (order store) │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │
//! │   Event Topic   │◄─── At-least-once delivery
//! └────────┬────────┘
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//! ┌────────┐ ┌───────┐
//! │ Notify │ │ Other │
//! └────────┘ └───────┘
//! ```
//!
//! A failed publish never rolls back the order; the processor reports the
//! item as failed so redelivery re-publishes.

use crate::message::Message;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during publishing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Failed to publish a message.
    #[error("Publish failed for message {message_id}: {reason}")]
    PublishFailed {
        /// Message that failed.
        message_id: String,
        /// The reason for failure.
        reason: String,
    },

    /// Network or transport error.
    #[error("Topic unavailable: {0}")]
    Unavailable(String),
}

/// Publisher side of the lifecycle event topic.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn EventTopic>`.
pub trait EventTopic: Send + Sync {
    /// Publish a message to every subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError`] if the publish was not acknowledged.
    fn publish(
        &self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), TopicError>> + Send + '_>>;
}
