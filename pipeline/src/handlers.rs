//! HTTP handlers for the order pipeline.
//!
//! Handlers only translate: extract the caller and request, call
//! [`OrderPipeline`], and map the result to a status code. Caller identity is
//! read from headers the API gateway injects after authenticating:
//!
//! - `X-Auth-Claims`: verified token claims as JSON
//! - `X-Api-Key`: the API key, when no claims are present

use crate::api::{OrderLookupError, OrderPipeline, SubmitError};
use crate::identity::{AuthContext, AuthenticationError, Claims, UserInfo, identify};
use crate::intake::AcceptedOrder;
use crate::validator::OrderRequest;
use axum::{
    Json, async_trait,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
};
use order_pipeline_core::types::{Order, OrderId, OrderMetadata};
use order_pipeline_web::{AppError, ClientIp, RequestId, UserAgent};
use std::convert::Infallible;
use std::sync::Arc;

/// Header carrying verified token claims.
pub const CLAIMS_HEADER: &str = "X-Auth-Claims";
/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        if let Some(raw) = header(CLAIMS_HEADER) {
            match serde_json::from_str::<Claims>(raw) {
                Ok(claims) => return Ok(Self::Claims(claims)),
                Err(err) => tracing::warn!(error = %err, "Ignoring unparseable claims header"),
            }
        }

        Ok(header(API_KEY_HEADER).map_or(Self::Anonymous, |key| Self::ApiKey {
            key: key.to_string(),
        }))
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Authentication(err) => err.into(),
            SubmitError::Validation(message) => Self::bad_request(message),
            SubmitError::Internal => Self::internal(),
        }
    }
}

impl From<OrderLookupError> for AppError {
    fn from(err: OrderLookupError) -> Self {
        match err {
            OrderLookupError::Authentication(err) => err.into(),
            OrderLookupError::NotFound(id) => Self::not_found("Order", id),
            OrderLookupError::Internal => Self::internal(),
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(err: AuthenticationError) -> Self {
        Self::unauthorized(err.to_string())
    }
}

/// Submit a new order.
///
/// # Endpoint
///
/// ```text
/// POST /orders
/// Content-Type: application/json
///
/// {
///   "items": [
///     { "productId": "P1", "quantity": 2, "price": 25.50 },
///     { "productId": "P2", "quantity": 1, "price": 49.99 }
///   ]
/// }
/// ```
///
/// # Response
///
/// `202 Accepted`
///
/// ```json
/// {
///   "orderId": "5f0c...",
///   "status": "PENDING",
///   "message": "Order received and processing",
///   "estimatedProcessingTime": "2-5 minutes",
///   "totalAmount": 100.99
/// }
/// ```
pub async fn create_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    request_id: RequestId,
    client_ip: ClientIp,
    user_agent: UserAgent,
    auth: AuthContext,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedOrder>), AppError> {
    if !identify(&auth).is_authenticated() {
        return Err(AuthenticationError::Unauthorized.into());
    }
    let Json(request) = payload?;

    let metadata = OrderMetadata {
        user_agent: user_agent
            .0
            .unwrap_or_else(|| OrderMetadata::UNKNOWN.to_string()),
        source_ip: client_ip
            .0
            .map_or_else(|| OrderMetadata::UNKNOWN.to_string(), |ip| ip.to_string()),
    };

    let accepted = pipeline.submit_order(&auth, &request, metadata).await?;
    tracing::debug!(request_id = %request_id.0, order_id = %accepted.order_id, "Order submitted");

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Read one of the caller's orders.
///
/// # Endpoint
///
/// ```text
/// GET /orders/:id
/// ```
pub async fn get_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    auth: AuthContext,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = pipeline.get_order(&auth, &OrderId::new(order_id)).await?;
    Ok(Json(order))
}

/// Profile of the calling user.
///
/// # Endpoint
///
/// ```text
/// GET /me
/// ```
#[allow(clippy::unused_async)]
pub async fn get_user_info(
    State(pipeline): State<Arc<OrderPipeline>>,
    auth: AuthContext,
) -> Result<Json<UserInfo>, AppError> {
    Ok(Json(pipeline.get_user_info(&auth)?))
}
