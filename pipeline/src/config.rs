//! Configuration management for the order pipeline.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that fail to parse fall back to their default.

use order_pipeline_core::types::Money;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Validation limits
    pub limits: OrderLimits,
    /// Work item classification thresholds
    pub classification: ClassificationConfig,
    /// Batch processor settings
    pub batch: BatchConfig,
    /// Payment simulator policy
    pub payment: PaymentConfig,
    /// Notification delivery settings
    pub notify: NotifyConfig,
    /// HTTP server settings (binary only)
    pub server: ServerConfig,
}

/// Limits enforced by the order validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLimits {
    /// Maximum order total (default: $10000.00)
    pub max_total: Money,
    /// Maximum quantity of a single line item (default: 100)
    pub max_quantity_per_item: u32,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            max_total: Money::from_dollars(10_000),
            max_quantity_per_item: 100,
        }
    }
}

/// Thresholds that tag work items as `BULK` / `HIGH` priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// More line items than this makes an order `BULK` (default: 5)
    pub bulk_item_threshold: usize,
    /// A total above this makes an order `HIGH` priority (default: $1000.00)
    pub high_priority_amount: Money,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            bulk_item_threshold: 5,
            high_priority_amount: Money::from_dollars(1_000),
        }
    }
}

/// Batch processor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items processed concurrently within one batch (default: 10)
    pub max_concurrency: usize,
    /// Deadline for a single item in milliseconds (default: 30000)
    pub item_timeout_ms: u64,
    /// Retries when marking an order `FAILED` hits a transient store error (default: 2)
    pub mark_failed_retries: usize,
}

impl BatchConfig {
    /// Per-item deadline.
    #[must_use]
    pub const fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            item_timeout_ms: 30_000,
            mark_failed_retries: 2,
        }
    }
}

/// Which payment simulator to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPolicy {
    /// Approve every charge
    Approve,
    /// Decline every charge
    Decline,
    /// Deterministic per-order outcome from a seed
    Seeded,
}

/// Payment simulator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Simulator policy (default: seeded)
    pub policy: PaymentPolicy,
    /// Seed mixed into every per-order outcome (default: 42)
    pub seed: u64,
    /// Fraction of charges approved by the seeded policy (default: 0.9)
    pub approval_rate: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            policy: PaymentPolicy::Seeded,
            seed: 42,
            approval_rate: 0.9,
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Delivery retries before a notification is dropped (default: 2)
    pub max_retries: usize,
    /// Initial retry delay in milliseconds (default: 100)
    pub retry_delay_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 100,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Prometheus exporter port
    pub metrics_port: u16,
    /// Log filter directive (`RUST_LOG`)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_port: 9090,
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Tests use this instead of mutating the process environment.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).map(|s| s.trim().to_string());

        let money = |key: &str, default: Money| {
            parse(key)
                .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
                .and_then(|d| Money::try_from(d).ok())
                .unwrap_or(default)
        };

        Self {
            limits: OrderLimits {
                max_total: Some(money("ORDER_MAX_TOTAL", defaults.limits.max_total))
                    .filter(|m| m.cents() > 0)
                    .unwrap_or(defaults.limits.max_total),
                max_quantity_per_item: parse("ORDER_MAX_QUANTITY")
                    .and_then(|s| s.parse().ok())
                    .filter(|n: &u32| *n > 0)
                    .unwrap_or(defaults.limits.max_quantity_per_item),
            },
            classification: ClassificationConfig {
                bulk_item_threshold: parse("BULK_ITEM_THRESHOLD")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.classification.bulk_item_threshold),
                high_priority_amount: money(
                    "HIGH_PRIORITY_AMOUNT",
                    defaults.classification.high_priority_amount,
                ),
            },
            batch: BatchConfig {
                max_concurrency: parse("BATCH_MAX_CONCURRENCY")
                    .and_then(|s| s.parse().ok())
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(defaults.batch.max_concurrency),
                item_timeout_ms: parse("BATCH_ITEM_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .filter(|ms: &u64| *ms > 0)
                    .unwrap_or(defaults.batch.item_timeout_ms),
                mark_failed_retries: parse("BATCH_MARK_FAILED_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.batch.mark_failed_retries),
            },
            payment: PaymentConfig {
                policy: parse("PAYMENT_POLICY")
                    .and_then(|s| match s.to_ascii_lowercase().as_str() {
                        "approve" => Some(PaymentPolicy::Approve),
                        "decline" => Some(PaymentPolicy::Decline),
                        "seeded" => Some(PaymentPolicy::Seeded),
                        _ => None,
                    })
                    .unwrap_or(defaults.payment.policy),
                seed: parse("PAYMENT_SEED")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.payment.seed),
                approval_rate: parse("PAYMENT_APPROVAL_RATE")
                    .and_then(|s| s.parse().ok())
                    .filter(|rate: &f64| (0.0..=1.0).contains(rate))
                    .unwrap_or(defaults.payment.approval_rate),
            },
            notify: NotifyConfig {
                max_retries: parse("NOTIFY_MAX_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.notify.max_retries),
                retry_delay_ms: parse("NOTIFY_RETRY_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.notify.retry_delay_ms),
            },
            server: ServerConfig {
                host: parse("HOST").unwrap_or(defaults.server.host),
                port: parse("PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.port),
                metrics_port: parse("METRICS_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.metrics_port),
                log_level: parse("RUST_LOG").unwrap_or(defaults.server.log_level),
            },
        }
    }
}
