//! Customer notifications.
//!
//! The dispatcher turns lifecycle events into notifications and hands them to
//! a [`NotificationChannel`]. It never fails the caller: undecodable events
//! are skipped, delivery is retried a few times, and whatever still fails is
//! recorded in the [`DispatchReport`] and dropped.

use crate::config::NotifyConfig;
use crate::events::{EventType, ReceivedEvent};
use order_pipeline_core::message::{Message, MessageError};
use order_pipeline_core::notification::{Notification, NotificationChannel, NotificationError};
use order_pipeline_runtime::metrics::NotificationMetrics;
use order_pipeline_runtime::retry::{RetryPolicy, retry_with_backoff};
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

/// Channel that writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn deliver(
        &self,
        notification: &Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + '_>> {
        tracing::info!(
            order_id = %notification.order_id,
            event_type = %notification.event_type,
            recipient = notification.recipient.as_deref().unwrap_or("-"),
            subject = %notification.subject,
            body = %notification.body,
            "Notification sent"
        );
        Box::pin(async { Ok(()) })
    }
}

/// Format an event into a notification.
///
/// Unknown event types produce a generic "Order Update".
#[must_use]
pub fn format_notification(event: &ReceivedEvent) -> Notification {
    let order_id = &event.order_id;
    let (subject, body) = match EventType::parse(event.event_type()) {
        Some(EventType::OrderConfirmed) => {
            let mut body = format!("Your order {order_id} has been confirmed.");
            if let Some(total) = event.total_amount {
                body.push_str(&format!(" Total: {}.", format_amount(total)));
            }
            if let Some(payment_id) = &event.payment_id {
                body.push_str(&format!(" Payment reference: {payment_id}."));
            }
            (EventType::OrderConfirmed.subject().to_string(), body)
        }
        Some(EventType::OrderFailed) => {
            let reason = event.failure_reason.as_deref().unwrap_or("unknown error");
            (
                EventType::OrderFailed.subject().to_string(),
                format!("We could not process your order {order_id}. Reason: {reason}."),
            )
        }
        None => {
            let status = event.status.as_deref().unwrap_or("updated");
            (
                "Order Update".to_string(),
                format!("Your order {order_id} status is now {status}."),
            )
        }
    };

    Notification {
        event_type: event.event_type().to_string(),
        order_id: order_id.clone(),
        recipient: event.customer_email.clone(),
        subject,
        body,
    }
}

fn format_amount(amount: Decimal) -> String {
    format!("${amount:.2}")
}

/// Why a message produced no delivered notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The event could not be decoded.
    #[error("Malformed event: {0}")]
    Malformed(#[from] MessageError),

    /// The channel failed after all retries.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] NotificationError),
}

/// One message that did not end in a delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Topic message id
    pub message_id: String,
    /// What went wrong
    pub error: DispatchError,
}

/// Outcome of a dispatch run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Notifications delivered
    pub delivered: usize,
    /// Messages skipped because they could not be decoded
    pub skipped: usize,
    /// Every message that was not delivered, with the reason
    pub failures: Vec<DispatchFailure>,
}

/// Formats lifecycle events and delivers them.
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    retry: RetryPolicy,
}

impl NotificationDispatcher {
    /// Create a dispatcher delivering through `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>, config: &NotifyConfig) -> Self {
        let retry = RetryPolicy::builder()
            .max_retries(config.max_retries)
            .initial_delay(Duration::from_millis(config.retry_delay_ms))
            .build();
        Self { channel, retry }
    }

    /// Deliver one notification per event. Never fails.
    pub async fn dispatch(&self, messages: &[Message]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for message in messages {
            let event = match ReceivedEvent::from_message(message) {
                Ok(event) => event,
                Err(err) => {
                    NotificationMetrics::record("skipped");
                    tracing::warn!(message_id = %message.message_id, error = %err, "Skipping undecodable event");
                    report.skipped += 1;
                    report.failures.push(DispatchFailure {
                        message_id: message.message_id.clone(),
                        error: err.into(),
                    });
                    continue;
                }
            };

            let notification = format_notification(&event);
            let span = tracing::info_span!(
                "notify",
                order_id = %notification.order_id,
                event_type = %notification.event_type,
                message_id = %message.message_id,
            );

            let delivered = retry_with_backoff(&self.retry, "deliver_notification", || {
                self.channel.deliver(&notification)
            })
            .instrument(span)
            .await;

            match delivered {
                Ok(()) => {
                    NotificationMetrics::record("delivered");
                    report.delivered += 1;
                }
                Err(err) => {
                    NotificationMetrics::record("failed");
                    tracing::error!(
                        message_id = %message.message_id,
                        order_id = %notification.order_id,
                        error = %err,
                        "Notification dropped after retries"
                    );
                    report.failures.push(DispatchFailure {
                        message_id: message.message_id.clone(),
                        error: err.into(),
                    });
                }
            }
        }

        tracing::info!(
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failures.len() - report.skipped,
            "Notifications processed"
        );
        report
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
