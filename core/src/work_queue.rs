//! Work queue abstraction.
//!
//! The intake path enqueues one work item per persisted order. Delivery to the
//! batch processor happens outside this contract: the queue hands batches of
//! [`Message`]s to whoever invokes the processor, at least once, and accepts
//! per-item acknowledgment where the underlying technology supports it.
//!
//! # Key Principles
//!
//! - **At-least-once**: a message may be delivered more than once
//! - **Attributes route**: classification tags travel as message attributes so
//!   consumers can prioritise without decoding the body
//! - **Never queried for state**: the order store owns order status

use crate::message::Message;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while enqueueing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue rejected the message (size, format, permissions).
    #[error("Enqueue rejected for message {message_id}: {reason}")]
    Rejected {
        /// Message that was rejected.
        message_id: String,
        /// Reason given by the queue.
        reason: String,
    },

    /// Network or transport error.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Producer side of the work queue.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn WorkQueue>`.
pub trait WorkQueue: Send + Sync {
    /// Enqueue a message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue did not accept the message.
    fn enqueue(
        &self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;
}
