//! End-to-end pipeline tests: tracer → collector → storage → analyzer.

use axum::http::HeaderMap;
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use tracehub::analyzer::Analyzer;
use tracehub::collector::{Collector, FileStore, QueryFilter};
use tracehub::config::{AnalyzerConfig, CollectorConfig};
use tracehub::span::{OperationCategory, SpanRecord, SpanStatus, TraceContext};
use tracehub::{Shutdown, Tracer};

mod common;
use common::make_span;

fn collector_on(dir: &std::path::Path, config: CollectorConfig) -> Arc<Collector> {
    Arc::new(Collector::new(config, FileStore::new(dir)))
}

#[tokio::test]
async fn cross_service_flow_builds_one_trace_and_a_dependency_edge() {
    let dir = tempfile::tempdir().unwrap();
    let collector = collector_on(dir.path(), CollectorConfig::default());
    let gateway = Tracer::new("gateway", Arc::clone(&collector));
    let image_service = Tracer::new("image-service", Arc::clone(&collector));

    // Caller side: open a span and put its context on the wire.
    let mut flow = gateway.flow();
    let call = flow.start_span("POST /images", OperationCategory::NetworkCall);
    let mut headers = HeaderMap::new();
    let ctx = flow.current_trace_context().unwrap();
    ctx.inject(&mut headers);

    // Callee side: rebuild the context from the headers and continue
    // the same trace in a separate flow.
    let remote = TraceContext::extract(&headers).unwrap();
    let mut remote_flow = image_service.flow_from(Some(remote));
    let work = remote_flow.start_span("generate", OperationCategory::BackgroundTask);
    remote_flow.end_span(work, SpanStatus::Success, None);

    flow.end_span(call, SpanStatus::Success, None);

    let records = collector.query(&QueryFilter::last_hours(1)).await.unwrap();
    assert_eq!(records.len(), 2);
    let trace_ids: BTreeSet<Uuid> = records.iter().map(|r| r.span.trace_id).collect();
    assert_eq!(trace_ids.len(), 1);
    let child = records
        .iter()
        .find(|r| r.span.service_name == "image-service")
        .unwrap();
    assert_eq!(child.span.parent_span_id, Some(ctx.span_id));

    let analyzer = Analyzer::new(Arc::clone(&collector), AnalyzerConfig::default());
    let services = analyzer.services(1).await.unwrap();
    let gateway_report = services
        .iter()
        .find(|s| s.service_name == "gateway")
        .unwrap();
    assert_eq!(gateway_report.downstream, vec!["image-service".to_string()]);
}

#[tokio::test]
async fn exported_records_reingest_with_identity_intact() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = collector_on(source_dir.path(), CollectorConfig::default());

    let tracer = Tracer::new("svc-a", Arc::clone(&source));
    for i in 0..5 {
        let mut flow = tracer.flow();
        let handle = flow.start_span(format!("op-{}", i), OperationCategory::Other);
        flow.end_span(handle, SpanStatus::Success, None);
    }

    let chunks: Vec<_> = source
        .export(None, None)
        .await
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
        .await;
    assert!(!chunks.is_empty());
    let text: String = chunks
        .iter()
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect();

    let target_dir = tempfile::tempdir().unwrap();
    let target = collector_on(target_dir.path(), CollectorConfig::default());
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let record: SpanRecord = serde_json::from_str(line).unwrap();
        target.ingest(record.span);
    }

    let ids = |records: &[SpanRecord]| -> BTreeSet<(Uuid, Uuid)> {
        records
            .iter()
            .map(|r| (r.span.trace_id, r.span.span_id))
            .collect()
    };
    let original = source.query(&QueryFilter::last_hours(1)).await.unwrap();
    let reingested = target.query(&QueryFilter::last_hours(1)).await.unwrap();
    assert_eq!(original.len(), 5);
    assert_eq!(ids(&original), ids(&reingested));
}

#[tokio::test]
async fn flush_task_batches_and_drains_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = CollectorConfig {
        batch_size: 100,
        // Long enough that only the batch nudge and the final flush fire.
        flush_interval_secs: 60,
        ..CollectorConfig::default()
    };
    let collector = collector_on(dir.path(), config);

    let shutdown = Shutdown::new();
    let flush_collector = Arc::clone(&collector);
    let flush_rx = shutdown.subscribe();
    let flush_task = tokio::spawn(async move {
        flush_collector.run(flush_rx).await;
    });

    for _ in 0..150 {
        collector.ingest(make_span("svc-a", "op", 1.0, SpanStatus::Success));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    let stats = collector.stats();
    assert_eq!(stats.total_spans, 150);
    // The batch nudge flushed at least the first hundred.
    assert!(stats.memory_traces_count <= 50);

    shutdown.trigger();
    flush_task.await.unwrap();
    assert_eq!(collector.stats().memory_traces_count, 0);

    let mut filter = QueryFilter::last_hours(1);
    filter.limit = 1000;
    let records = collector.query(&filter).await.unwrap();
    assert_eq!(records.len(), 150);
}

#[tokio::test]
async fn query_window_excludes_old_stored_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    let old_time = Utc::now() - ChronoDuration::days(3);
    let mut old_span = make_span("svc-a", "stale", 1.0, SpanStatus::Success);
    old_span.start_time = old_time;
    old_span.end_time = Some(old_time);
    store
        .append_batch(&[SpanRecord {
            span: old_span,
            collected_at: old_time,
        }])
        .await
        .unwrap();

    let collector = Arc::new(Collector::new(CollectorConfig::default(), store));
    collector.ingest(make_span("svc-a", "fresh", 1.0, SpanStatus::Success));

    let recent = collector.query(&QueryFilter::last_hours(24)).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].span.operation_name, "fresh");

    let wide = collector.query(&QueryFilter::last_hours(96)).await.unwrap();
    assert_eq!(wide.len(), 2);
    // Newest first.
    assert_eq!(wide[0].span.operation_name, "fresh");
    assert_eq!(wide[1].span.operation_name, "stale");
}
