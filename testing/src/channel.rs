//! Recording notification channel.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::failure::FailureSwitch;
use order_pipeline_core::notification::{Notification, NotificationChannel, NotificationError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// [`NotificationChannel`] that keeps every delivered notification.
#[derive(Clone, Debug, Default)]
pub struct RecordingChannel {
    delivered: Arc<RwLock<Vec<Notification>>>,
    failures: Arc<FailureSwitch>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingChannel {
    /// Create an empty channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.read().unwrap().clone()
    }

    /// Delivery attempts, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Fail the next `count` deliveries.
    pub fn fail_next(&self, count: usize) {
        self.failures.fail_next(count);
    }

    /// Fail every delivery.
    pub fn fail_always(&self) {
        self.failures.fail_always();
    }
}

impl NotificationChannel for RecordingChannel {
    fn deliver(
        &self,
        notification: &Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + '_>> {
        let notification = notification.clone();
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures.trip() {
                return Err(NotificationError::Unavailable("injected delivery failure".to_string()));
            }
            self.delivered.write().unwrap().push(notification);
            Ok(())
        })
    }
}
