//! Shared utilities for integration tests.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use chrono::Utc;
use tracehub::span::{OperationCategory, Span, SpanStatus};
use tracehub::{Collector, HttpServer, ServiceConfig, Shutdown};
use uuid::Uuid;

/// A config suitable for tests: tempdir storage, fast flushes, no metrics
/// listener.
#[allow(dead_code)]
pub fn test_config(data_dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.server.service_name = "trace-admin".to_string();
    config.storage.data_dir = data_dir.display().to_string();
    config.collector.flush_interval_secs = 1;
    config.observability.metrics_enabled = false;
    config
}

/// Start a server on an ephemeral port. Returns the bound address, the
/// server's collector, and the shutdown handle.
#[allow(dead_code)]
pub async fn start_server(config: ServiceConfig) -> (SocketAddr, Arc<Collector>, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    let collector = server.collector();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, &server_shutdown).await;
    });

    // Wait for the server to start
    tokio::time::sleep(Duration::from_millis(200)).await;
    (addr, collector, shutdown)
}

/// A completed span ready for ingestion.
#[allow(dead_code)]
pub fn make_span(service: &str, operation: &str, duration_ms: f64, status: SpanStatus) -> Span {
    let now = Utc::now();
    Span {
        trace_id: Uuid::new_v4(),
        span_id: Uuid::new_v4(),
        parent_span_id: None,
        service_name: service.to_string(),
        operation_name: operation.to_string(),
        operation_category: OperationCategory::Other,
        start_time: now,
        end_time: Some(now),
        duration_ms: Some(duration_ms),
        status,
        attributes: BTreeMap::new(),
        error_info: None,
    }
}
