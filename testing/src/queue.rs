//! In-memory work queue with at-least-once redelivery.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::failure::FailureSwitch;
use order_pipeline_core::message::Message;
use order_pipeline_core::work_queue::{QueueError, WorkQueue};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct QueueState {
    enqueued: Vec<Message>,
    pending: VecDeque<Message>,
    in_flight: Vec<Message>,
    receive_counts: HashMap<String, u32>,
    dead_letters: Vec<Message>,
}

/// [`WorkQueue`] fake that also plays the consumer side.
///
/// Consumers take batches with [`InMemoryWorkQueue::receive_batch`] and
/// report per-item failures with [`InMemoryWorkQueue::settle`]. Failed
/// messages go back to the queue until they have been received
/// `max_receives` times, then move to the dead-letter list.
///
/// # Example
///
/// ```
/// use order_pipeline_core::message::Message;
/// use order_pipeline_core::work_queue::WorkQueue;
/// use order_pipeline_testing::InMemoryWorkQueue;
///
/// # async fn example() {
/// let queue = InMemoryWorkQueue::new();
/// queue.enqueue(Message::new("m-1".into(), "{}".into())).await.unwrap();
///
/// let _batch = queue.receive_batch(10);
/// queue.settle(&["m-1".to_string()]);
/// assert_eq!(queue.pending_len(), 1); // redelivered
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryWorkQueue {
    state: Arc<Mutex<QueueState>>,
    failures: Arc<FailureSwitch>,
    max_receives: u32,
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkQueue {
    /// Create a queue that dead-letters after three receives.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_receives(3)
    }

    /// Create a queue with a custom redrive limit.
    #[must_use]
    pub fn with_max_receives(max_receives: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            failures: Arc::new(FailureSwitch::default()),
            max_receives: max_receives.max(1),
        }
    }

    /// Fail the next `count` enqueues.
    pub fn fail_next_enqueues(&self, count: usize) {
        self.failures.fail_next(count);
    }

    /// Every message ever accepted, in order.
    #[must_use]
    pub fn enqueued(&self) -> Vec<Message> {
        self.state.lock().unwrap().enqueued.clone()
    }

    /// Messages waiting to be received.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Messages that exhausted their receives.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<Message> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    /// Take up to `max` pending messages; they stay in flight until settled.
    #[must_use]
    pub fn receive_batch(&self, max: usize) -> Vec<Message> {
        let mut state = self.state.lock().unwrap();
        let take = max.min(state.pending.len());
        let batch: Vec<Message> = state.pending.drain(..take).collect();
        for message in &batch {
            *state
                .receive_counts
                .entry(message.message_id.clone())
                .or_insert(0) += 1;
        }
        state.in_flight.extend(batch.iter().cloned());
        batch
    }

    /// Acknowledge every in-flight message except `failed_ids`, which are
    /// redelivered or dead-lettered.
    pub fn settle(&self, failed_ids: &[String]) {
        let mut state = self.state.lock().unwrap();
        let in_flight = std::mem::take(&mut state.in_flight);
        for message in in_flight {
            if !failed_ids.contains(&message.message_id) {
                state.receive_counts.remove(&message.message_id);
                continue;
            }
            let receives = state
                .receive_counts
                .get(&message.message_id)
                .copied()
                .unwrap_or(0);
            if receives >= self.max_receives {
                state.receive_counts.remove(&message.message_id);
                state.dead_letters.push(message);
            } else {
                state.pending.push_back(message);
            }
        }
    }
}

impl WorkQueue for InMemoryWorkQueue {
    fn enqueue(
        &self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            if self.failures.trip() {
                return Err(QueueError::Unavailable("injected enqueue failure".to_string()));
            }
            let mut state = self.state.lock().unwrap();
            state.enqueued.push(message.clone());
            state.pending.push_back(message);
            Ok(())
        })
    }
}
