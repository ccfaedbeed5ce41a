//! Notification delivery channel.
//!
//! The notification dispatcher formats lifecycle events into [`Notification`]s
//! and hands them to a channel (email, push, chat webhook). Channel failures
//! are absorbed by the dispatcher and never reach the event source.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A user-facing notification ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Lifecycle event type that produced this notification.
    pub event_type: String,
    /// Order the notification is about.
    pub order_id: String,
    /// Recipient address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Errors a channel may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The channel refused the notification.
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// The channel could not be reached.
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

/// Destination for formatted notifications.
pub trait NotificationChannel: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery failed.
    fn deliver(
        &self,
        notification: &Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + '_>>;
}
