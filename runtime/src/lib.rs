//! # Order Pipeline Runtime
//!
//! Execution helpers shared by every stage of the order pipeline.
//!
//! ## Core Components
//!
//! - **Retry**: exponential backoff for transient collaborator failures
//! - **Deadlines**: bounded wall-clock budget per unit of work
//! - **Metrics**: Prometheus recorder and per-stage metric helpers
//!
//! ## Example
//!
//! ```
//! use order_pipeline_runtime::deadline::with_deadline;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let result = with_deadline(Duration::from_secs(1), async { 42 }).await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Wall-clock budgets for units of work.
///
/// A stage that exceeds its budget is treated as failed, exactly like any
/// other processing error. The underlying future is dropped, so work in
/// flight is cancelled at its next await point.
pub mod deadline {
    use std::future::Future;
    use std::time::Duration;
    use thiserror::Error;

    /// The budget elapsed before the work completed.
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    #[error("Deadline of {}ms exceeded", .0.as_millis())]
    pub struct DeadlineExceeded(pub Duration);

    /// Run `work` to completion or until `budget` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineExceeded`] carrying the budget when time runs out.
    pub async fn with_deadline<F>(budget: Duration, work: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        tokio::time::timeout(budget, work)
            .await
            .map_err(|_| DeadlineExceeded(budget))
    }

}
