//! Prometheus metrics for the order pipeline.
//!
//! Each stage records through a small recorder type:
//! - Intake: submissions, rejections, reconciliation gaps
//! - Batch processing: per-item outcomes and batch duration
//! - Payment: charge outcomes
//! - Notifications: delivery outcomes
//! - Retry: attempts, recoveries, exhaustion
//!
//! Without an installed recorder every call is a no-op, so unit tests can
//! exercise instrumented code freely.
//!
//! # Example
//!
//! ```rust,no_run
//! use order_pipeline_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder and serves `/metrics` on `addr` for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and spawn the HTTP exporter.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built. An already-installed
    /// recorder is logged and tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let (recorder, exporter) = builder
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "Metrics recorder already installed, skipping exporter");
            return Ok(());
        }

        tokio::spawn(async move {
            // `ExporterError` implements neither `Debug` nor `Display` in
            // metrics-exporter-prometheus 0.15, so it cannot be logged.
            if let Err(_e) = exporter.await {
                tracing::error!("Metrics exporter stopped");
            }
        });

        tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
        self.handle = Some(handle);
        Ok(())
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!("orders_submitted_total", "Orders accepted at intake");
    describe_counter!("orders_rejected_total", "Orders rejected at intake, by reason");
    describe_counter!(
        "intake_reconciliation_gaps_total",
        "Orders persisted as PENDING whose work item could not be enqueued"
    );

    describe_counter!("batch_items_total", "Work items processed, by outcome");
    describe_histogram!("batch_duration_seconds", "Time taken to process a queue batch");

    describe_counter!("payments_total", "Payment attempts, by outcome");

    describe_counter!("notifications_total", "Notification deliveries, by outcome");

    describe_counter!("sweep_requeued_total", "Stale PENDING orders re-enqueued by the sweep");

    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!("retry_successes_total", "Operations that succeeded after retrying");
    describe_counter!("retry_exhausted_total", "Operations that exhausted their retries");
}

/// Intake metrics recorder.
pub struct IntakeMetrics;

impl IntakeMetrics {
    /// Record an accepted order.
    pub fn record_submitted(order_type: &'static str, priority: &'static str) {
        counter!("orders_submitted_total", "order_type" => order_type, "priority" => priority).increment(1);
    }

    /// Record a rejected submission.
    pub fn record_rejected(reason: &'static str) {
        counter!("orders_rejected_total", "reason" => reason).increment(1);
    }

    /// Record a persisted order left without a work item.
    pub fn record_reconciliation_gap() {
        counter!("intake_reconciliation_gaps_total").increment(1);
    }
}

/// Batch processing metrics recorder.
pub struct BatchMetrics;

impl BatchMetrics {
    /// Record one item outcome (`confirmed`, `failed`, `already_terminal`, ...).
    pub fn record_item(outcome: &'static str) {
        counter!("batch_items_total", "outcome" => outcome).increment(1);
    }

    /// Record a completed batch.
    pub fn record_batch(duration: Duration) {
        histogram!("batch_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Payment metrics recorder.
pub struct PaymentMetrics;

impl PaymentMetrics {
    /// Record a charge outcome (`approved`, `declined`, `unavailable`).
    pub fn record(outcome: &'static str) {
        counter!("payments_total", "outcome" => outcome).increment(1);
    }
}

/// Notification metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a delivery outcome (`delivered`, `skipped`, `failed`).
    pub fn record(outcome: &'static str) {
        counter!("notifications_total", "outcome" => outcome).increment(1);
    }
}

/// Sweep metrics recorder.
pub struct SweepMetrics;

impl SweepMetrics {
    /// Record orders re-enqueued in one sweep.
    pub fn record_requeued(count: usize) {
        counter!("sweep_requeued_total").increment(u64::try_from(count).unwrap_or(u64::MAX));
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
