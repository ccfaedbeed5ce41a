//! Custom Axum extractors.
//!
//! - `RequestId`: the id assigned by [`request_id_layer`](crate::middleware::request_id_layer)
//! - `ClientIp`: client address from proxy headers or the connection
//! - `UserAgent`: the `User-Agent` header
//!
//! None of these reject: missing information is `None` and the handler
//! decides the fallback (orders record `"unknown"`).
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     request_id: RequestId,
//!     client_ip: ClientIp,
//!     user_agent: UserAgent,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(request_id = %request_id.0, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::middleware::REQUEST_ID_HEADER;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// Request id for tracing a call through the pipeline.
///
/// Taken from request extensions (set by the middleware), then the
/// `X-Request-Id` header, otherwise freshly generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }
        Ok(request_id_from_headers(&parts.headers).unwrap_or_else(Self::generate))
    }
}

/// Read a usable request id from headers.
pub(crate) fn request_id_from_headers(headers: &HeaderMap) -> Option<RequestId> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| RequestId(s.to_string()))
}

/// Client IP address, when it can be determined.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection address (requires `into_make_service_with_connect_info`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self(extract_client_ip(&parts.headers, connect_info)))
    }
}

fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<IpAddr> {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            headers
                .get("X-Real-IP")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
}

/// `User-Agent` header, when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self(user_agent))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn request_id_from_header() {
        let mut parts = parts_with(&[(REQUEST_ID_HEADER, "gw-req-42")]);
        let id = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, RequestId("gw-req-42".to_string()));
    }

    #[tokio::test]
    async fn request_id_generated_when_missing() {
        let mut parts = parts_with(&[]);
        let id = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(Uuid::parse_str(&id.0).is_ok());
    }

    #[tokio::test]
    async fn client_ip_prefers_forwarded_for() {
        let mut parts = parts_with(&[
            ("X-Forwarded-For", "203.0.113.1, 198.51.100.1"),
            ("X-Real-IP", "198.51.100.42"),
        ]);
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.0.map(|ip| ip.to_string()).as_deref(), Some("203.0.113.1"));
    }

    #[tokio::test]
    async fn client_ip_from_real_ip_then_connection() {
        let mut parts = parts_with(&[("X-Real-IP", "198.51.100.42")]);
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.0.map(|ip| ip.to_string()).as_deref(), Some("198.51.100.42"));

        let mut parts = parts_with(&[]);
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))));
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.0.map(|ip| ip.to_string()).as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn client_ip_unknown() {
        let mut parts = parts_with(&[("X-Forwarded-For", "not-an-ip")]);
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, ClientIp(None));
    }

    #[tokio::test]
    async fn user_agent_optional() {
        let mut parts = parts_with(&[("User-Agent", "Mozilla/5.0 (Test)")]);
        let ua = UserAgent::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ua.0.as_deref(), Some("Mozilla/5.0 (Test)"));

        let mut parts = parts_with(&[]);
        let ua = UserAgent::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ua, UserAgent(None));
    }
}
