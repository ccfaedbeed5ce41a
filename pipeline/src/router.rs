//! Order pipeline HTTP router.

use crate::api::OrderPipeline;
use crate::handlers;
use axum::{
    Router,
    routing::{get, post},
};
use order_pipeline_web::{handlers::health_check, request_id_layer};
use std::sync::Arc;

/// Create the router with all endpoints.
///
/// # Routes
///
/// - `POST /orders` - Submit an order
/// - `GET /orders/:id` - Get one of the caller's orders
/// - `GET /me` - Caller profile
/// - `GET /health` - Liveness
///
/// Every response carries an `X-Request-Id` header.
pub fn order_router(pipeline: Arc<OrderPipeline>) -> Router {
    Router::new()
        .route("/orders", post(handlers::create_order))
        .route("/orders/:id", get(handlers::get_order))
        .route("/me", get(handlers::get_user_info))
        .with_state(pipeline)
        .route("/health", get(health_check))
        .layer(request_id_layer())
}
