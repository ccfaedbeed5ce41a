//! Boundary facade.
//!
//! [`OrderPipeline`] wires the stages together over one set of injected
//! collaborators and exposes the operations a transport adapter needs. Its
//! error types carry user-facing messages only; details stay in the logs.

use crate::config::PipelineConfig;
use crate::factory::OrderFactory;
use crate::identity::{AuthContext, AuthenticationError, UserInfo, identify, user_info};
use crate::intake::{AcceptedOrder, IntakeCoordinator, IntakeError};
use crate::notifications::{DispatchReport, LogChannel, NotificationDispatcher};
use crate::processor::{BatchError, BatchOrderProcessor, BatchReport};
use crate::reconcile::{ReenqueueSweep, SweepReport};
use crate::validator::OrderRequest;
use order_pipeline_core::environment::{Clock, IdGenerator, SystemClock, UuidGenerator};
use order_pipeline_core::event_topic::EventTopic;
use order_pipeline_core::message::Message;
use order_pipeline_core::notification::NotificationChannel;
use order_pipeline_core::order_store::{OrderStore, OrderStoreError};
use order_pipeline_core::payment::PaymentSimulator;
use order_pipeline_core::types::{Order, OrderId, OrderMetadata};
use order_pipeline_core::work_queue::WorkQueue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Collaborators the pipeline runs against.
#[derive(Clone)]
pub struct PipelineEnvironment {
    /// Source of truth for orders
    pub store: Arc<dyn OrderStore>,
    /// Work item queue
    pub queue: Arc<dyn WorkQueue>,
    /// Lifecycle event topic
    pub topic: Arc<dyn EventTopic>,
    /// Payment capability
    pub payments: Arc<dyn PaymentSimulator>,
    /// Notification destination
    pub channel: Arc<dyn NotificationChannel>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Order id source
    pub ids: Arc<dyn IdGenerator>,
}

impl PipelineEnvironment {
    /// Environment with the system clock, UUID ids and a logging channel.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        queue: Arc<dyn WorkQueue>,
        topic: Arc<dyn EventTopic>,
        payments: Arc<dyn PaymentSimulator>,
    ) -> Self {
        Self {
            store,
            queue,
            topic,
            payments,
            channel: Arc::new(LogChannel),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Replace the notification channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = channel;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the id generator.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

impl std::fmt::Debug for PipelineEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEnvironment").finish_non_exhaustive()
    }
}

/// Order submission failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The caller is not authenticated.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The request broke a validation rule.
    #[error("{0}")]
    Validation(String),

    /// Something failed on our side.
    #[error("Internal server error")]
    Internal,
}

impl From<IntakeError> for SubmitError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(err) => Self::Validation(err.to_string()),
            IntakeError::Persistence(_) | IntakeError::Encode { .. } | IntakeError::Enqueue { .. } => {
                Self::Internal
            }
        }
    }
}

/// Order lookup failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderLookupError {
    /// The caller is not authenticated.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// No such order for this caller.
    #[error("Order {0} not found")]
    NotFound(OrderId),

    /// Something failed on our side.
    #[error("Internal server error")]
    Internal,
}

/// The assembled order pipeline.
///
/// # Example
///
/// ```
/// use order_pipeline::api::{OrderPipeline, PipelineEnvironment};
/// use order_pipeline::config::PipelineConfig;
/// use order_pipeline::identity::AuthContext;
/// use order_pipeline::payment::ApprovingSimulator;
/// use order_pipeline::validator::OrderRequest;
/// use order_pipeline_core::types::OrderMetadata;
/// use order_pipeline_testing::{InMemoryEventTopic, InMemoryOrderStore, InMemoryWorkQueue};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let env = PipelineEnvironment::new(
///     Arc::new(InMemoryOrderStore::new()),
///     Arc::new(InMemoryWorkQueue::new()),
///     Arc::new(InMemoryEventTopic::new()),
///     Arc::new(ApprovingSimulator),
/// );
/// let pipeline = OrderPipeline::new(env, PipelineConfig::default());
///
/// let result = pipeline
///     .submit_order(&AuthContext::Anonymous, &OrderRequest::default(), OrderMetadata::default())
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct OrderPipeline {
    intake: IntakeCoordinator,
    processor: BatchOrderProcessor,
    dispatcher: NotificationDispatcher,
    sweep: ReenqueueSweep,
    store: Arc<dyn OrderStore>,
    config: PipelineConfig,
}

impl OrderPipeline {
    /// Assemble the stages over `env`.
    #[must_use]
    pub fn new(env: PipelineEnvironment, config: PipelineConfig) -> Self {
        let factory = OrderFactory::new(Arc::clone(&env.ids), Arc::clone(&env.clock));
        let intake = IntakeCoordinator::new(
            Arc::clone(&env.store),
            Arc::clone(&env.queue),
            factory,
            config.limits,
            config.classification,
        );
        let processor = BatchOrderProcessor::new(
            Arc::clone(&env.store),
            Arc::clone(&env.topic),
            Arc::clone(&env.payments),
            Arc::clone(&env.clock),
            config.batch,
        );
        let dispatcher = NotificationDispatcher::new(Arc::clone(&env.channel), &config.notify);
        let sweep = ReenqueueSweep::new(
            Arc::clone(&env.store),
            Arc::clone(&env.queue),
            Arc::clone(&env.clock),
            config.classification,
        );

        Self {
            intake,
            processor,
            dispatcher,
            sweep,
            store: env.store,
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Accept a new order from an authenticated caller.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Authentication`] for anonymous callers
    /// - [`SubmitError::Validation`] with the rule's message
    /// - [`SubmitError::Internal`] for store or queue failures
    pub async fn submit_order(
        &self,
        auth: &AuthContext,
        request: &OrderRequest,
        metadata: OrderMetadata,
    ) -> Result<AcceptedOrder, SubmitError> {
        let identity = identify(auth);
        if !identity.is_authenticated() {
            tracing::info!("Rejecting order from unauthenticated caller");
            return Err(AuthenticationError::Unauthorized.into());
        }
        Ok(self.intake.submit(request, &identity, metadata).await?)
    }

    /// Process one batch of work items from the order queue.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::PartialFailure`] if any item failed; the report
    /// lists the message ids to redeliver.
    pub async fn process_queue_batch(&self, messages: &[Message]) -> Result<BatchReport, BatchError> {
        self.processor.process_batch(messages).await
    }

    /// Turn lifecycle events into notifications. Never fails.
    pub async fn dispatch_events(&self, messages: &[Message]) -> DispatchReport {
        self.dispatcher.dispatch(messages).await
    }

    /// Profile of the calling user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::Unauthorized`] without token claims.
    pub fn get_user_info(&self, auth: &AuthContext) -> Result<UserInfo, AuthenticationError> {
        user_info(auth)
    }

    /// Read one of the caller's own orders.
    ///
    /// Orders belonging to someone else are reported as not found.
    ///
    /// # Errors
    ///
    /// - [`OrderLookupError::Authentication`] for anonymous callers
    /// - [`OrderLookupError::NotFound`] if absent or not owned by the caller
    /// - [`OrderLookupError::Internal`] if the store failed
    pub async fn get_order(&self, auth: &AuthContext, order_id: &OrderId) -> Result<Order, OrderLookupError> {
        let identity = identify(auth);
        if !identity.is_authenticated() {
            return Err(AuthenticationError::Unauthorized.into());
        }

        let order = self.store.get(order_id).await.map_err(|err| match err {
            OrderStoreError::NotFound(id) => OrderLookupError::NotFound(id),
            other => {
                tracing::error!(order_id = %order_id, error = %other, "Order lookup failed");
                OrderLookupError::Internal
            }
        })?;

        if order.customer_id.as_str() != identity.user_id {
            tracing::debug!(order_id = %order_id, user_id = %identity.user_id, "Order belongs to another customer");
            return Err(OrderLookupError::NotFound(order_id.clone()));
        }
        Ok(order)
    }

    /// Re-enqueue orders pending for longer than `older_than`.
    ///
    /// # Errors
    ///
    /// Returns the store error if pending orders cannot be listed.
    pub async fn sweep_pending(&self, older_than: Duration) -> Result<SweepReport, OrderStoreError> {
        self.sweep.run(older_than).await
    }
}

impl std::fmt::Debug for OrderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
