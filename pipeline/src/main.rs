//! Order pipeline HTTP server.
//!
//! Runs the whole pipeline in one process over in-memory infrastructure: the
//! HTTP surface accepts orders, and a background pump drains the work queue
//! into the batch processor and the event topic into the notification
//! dispatcher.
//!
//! # Usage
//!
//! ```bash
//! PAYMENT_POLICY=approve cargo run --bin order-pipeline --features http
//! ```
//!
//! # Example Requests
//!
//! ```bash
//! curl -X POST http://localhost:8080/orders \
//!   -H "Content-Type: application/json" \
//!   -H 'X-Auth-Claims: {"sub":"user-123","email":"customer@example.com"}' \
//!   -d '{"items":[{"productId":"P1","quantity":2,"price":25.50}]}'
//!
//! curl http://localhost:8080/orders/<order-id> \
//!   -H 'X-Auth-Claims: {"sub":"user-123","email":"customer@example.com"}'
//! ```

use anyhow::Context;
use order_pipeline::api::{OrderPipeline, PipelineEnvironment};
use order_pipeline::config::PipelineConfig;
use order_pipeline::payment::simulator_from_config;
use order_pipeline::router::order_router;
use order_pipeline_runtime::metrics::MetricsServer;
use order_pipeline_testing::{InMemoryEventTopic, InMemoryOrderStore, InMemoryWorkQueue};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RECEIVE_BATCH_SIZE: usize = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const STRANDED_AFTER: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let config = PipelineConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Order Pipeline ===");

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start().context("failed to start metrics server")?;

    let store = InMemoryOrderStore::new();
    let queue = InMemoryWorkQueue::new();
    let topic = InMemoryEventTopic::new();
    let payments = simulator_from_config(&config.payment);
    info!(policy = ?config.payment.policy, "Using in-memory infrastructure");

    let env = PipelineEnvironment::new(
        Arc::new(store),
        Arc::new(queue.clone()),
        Arc::new(topic.clone()),
        payments,
    );
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let pipeline = Arc::new(OrderPipeline::new(env, config));

    tokio::spawn(pump(Arc::clone(&pipeline), queue, topic));

    let app = order_router(pipeline);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server listening on http://{addr}");
    info!("  POST   /orders      - Submit order");
    info!("  GET    /orders/:id  - Get order");
    info!("  GET    /me          - Caller profile");
    info!("  GET    /health      - Health check");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Drive the queue consumer, the topic subscriber and the sweep.
async fn pump(pipeline: Arc<OrderPipeline>, queue: InMemoryWorkQueue, topic: InMemoryEventTopic) {
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let batch = queue.receive_batch(RECEIVE_BATCH_SIZE);
                if !batch.is_empty() {
                    let failed = match pipeline.process_queue_batch(&batch).await {
                        Ok(_) => Vec::new(),
                        Err(err) => err.report().batch_item_failures(),
                    };
                    queue.settle(&failed);
                }

                let events = topic.drain();
                if !events.is_empty() {
                    pipeline.dispatch_events(&events).await;
                }
            }
            _ = sweep.tick() => {
                if let Err(err) = pipeline.sweep_pending(STRANDED_AFTER).await {
                    tracing::warn!(error = %err, "Sweep failed");
                }
            }
        }
    }
}
