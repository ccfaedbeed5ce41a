//! Axum integration for the order pipeline.
//!
//! The HTTP surface is thin translation: handlers extract the request, call
//! the pipeline facade, and map the outcome to a status code and JSON body.
//! This crate holds the pieces every handler shares.
//!
//! # Request Flow
//!
//! 1. **Request id** assigned by [`request_id_layer`] (or taken from the gateway)
//! 2. **Extract** client metadata ([`ClientIp`], [`UserAgent`]) and the body
//! 3. **Call** the pipeline
//! 4. **Map** the result, or an [`AppError`], to a JSON response
//!
//! # Example
//!
//! ```
//! use axum::{Router, routing::get};
//! use order_pipeline_web::{handlers::health_check, request_id_layer};
//!
//! let app: Router = Router::new()
//!     .route("/health", get(health_check))
//!     .layer(request_id_layer());
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ClientIp, RequestId, UserAgent};
pub use middleware::{REQUEST_ID_HEADER, request_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
