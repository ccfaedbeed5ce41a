//! In-memory order store.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use crate::failure::FailureSwitch;
use chrono::{DateTime, Utc};
use order_pipeline_core::order_store::{
    OrderStore, OrderStoreError, StatusUpdate, apply_status_update,
};
use order_pipeline_core::types::{Order, OrderId, OrderStatus};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// `HashMap`-backed [`OrderStore`] with failure injection.
///
/// Status updates run [`apply_status_update`] under the write lock, giving
/// the same per-record compare-and-set a real store provides.
///
/// # Example
///
/// ```
/// use order_pipeline_core::order_store::{OrderStore, OrderStoreError};
/// use order_pipeline_testing::{InMemoryOrderStore, fixtures};
///
/// # async fn example() {
/// let store = InMemoryOrderStore::new();
/// let order = fixtures::pending_order("order-1");
///
/// assert!(store.create(order.clone()).await.is_ok());
/// assert!(matches!(store.create(order).await, Err(OrderStoreError::AlreadyExists(_))));
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    create_failures: Arc<FailureSwitch>,
    get_failures: Arc<FailureSwitch>,
    update_failures: Arc<FailureSwitch>,
    list_failures: Arc<FailureSwitch>,
    concurrent_update: Arc<Mutex<Option<StatusUpdate>>>,
    update_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an order directly, bypassing create-only checks.
    pub fn seed(&self, order: Order) {
        self.orders
            .write()
            .unwrap()
            .insert(order.order_id.clone(), order);
    }

    /// Snapshot of one order, if stored.
    #[must_use]
    pub fn snapshot(&self, order_id: &str) -> Option<Order> {
        self.orders
            .read()
            .unwrap()
            .get(&OrderId::new(order_id.to_string()))
            .cloned()
    }

    /// Number of stored orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().unwrap().is_empty()
    }

    /// How many times `update_status` was called.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `count` creates with `Unavailable`.
    pub fn fail_next_creates(&self, count: usize) {
        self.create_failures.fail_next(count);
    }

    /// Fail the next `count` gets with `Unavailable`.
    pub fn fail_next_gets(&self, count: usize) {
        self.get_failures.fail_next(count);
    }

    /// Fail the next `count` status updates with `Unavailable`.
    pub fn fail_next_updates(&self, count: usize) {
        self.update_failures.fail_next(count);
    }

    /// Fail every status update until [`InMemoryOrderStore::heal`].
    pub fn fail_all_updates(&self) {
        self.update_failures.fail_always();
    }

    /// Fail the next `count` listings with `Unavailable`.
    pub fn fail_next_lists(&self, count: usize) {
        self.list_failures.fail_next(count);
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        self.create_failures.reset();
        self.get_failures.reset();
        self.update_failures.reset();
        self.list_failures.reset();
    }

    /// Apply `update` just before the next `update_status` call, as if a
    /// concurrent worker won the race.
    pub fn race_next_update(&self, update: StatusUpdate) {
        *self.concurrent_update.lock().unwrap() = Some(update);
    }

    fn unavailable(operation: &str) -> OrderStoreError {
        OrderStoreError::Unavailable(format!("injected {operation} failure"))
    }
}

impl OrderStore for InMemoryOrderStore {
    fn create(
        &self,
        order: Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderStoreError>> + Send + '_>> {
        Box::pin(async move {
            if self.create_failures.trip() {
                return Err(Self::unavailable("create"));
            }
            let mut orders = self.orders.write().unwrap();
            if orders.contains_key(&order.order_id) {
                return Err(OrderStoreError::AlreadyExists(order.order_id));
            }
            orders.insert(order.order_id.clone(), order);
            Ok(())
        })
    }

    fn get(
        &self,
        order_id: &OrderId,
    ) -> Pin<Box<dyn Future<Output = Result<Order, OrderStoreError>> + Send + '_>> {
        let order_id = order_id.clone();
        Box::pin(async move {
            if self.get_failures.trip() {
                return Err(Self::unavailable("get"));
            }
            self.orders
                .read()
                .unwrap()
                .get(&order_id)
                .cloned()
                .ok_or(OrderStoreError::NotFound(order_id))
        })
    }

    fn update_status(
        &self,
        update: StatusUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<Order, OrderStoreError>> + Send + '_>> {
        Box::pin(async move {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.update_failures.trip() {
                return Err(Self::unavailable("update"));
            }

            let racing = self.concurrent_update.lock().unwrap().take();
            let mut orders = self.orders.write().unwrap();
            if let Some(racing) = racing {
                if let Some(order) = orders.get_mut(&racing.order_id) {
                    let _ = apply_status_update(order, racing);
                }
            }

            let order = orders
                .get_mut(&update.order_id)
                .ok_or_else(|| OrderStoreError::NotFound(update.order_id.clone()))?;
            apply_status_update(order, update)?;
            Ok(order.clone())
        })
    }

    fn list_by_status(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, OrderStoreError>> + Send + '_>> {
        Box::pin(async move {
            if self.list_failures.trip() {
                return Err(Self::unavailable("list"));
            }
            let mut matching: Vec<Order> = self
                .orders
                .read()
                .unwrap()
                .values()
                .filter(|order| order.status == status && order.created_at < created_before)
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.order_id.cmp(&b.order_id)));
            Ok(matching)
        })
    }
}
