//! Shared HTTP handlers.

pub mod health;

pub use health::{HealthResponse, health_check};
