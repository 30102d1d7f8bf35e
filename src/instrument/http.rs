//! Inbound request instrumentation.
//!
//! # Responsibilities
//! - Open a span per request, parented on an incoming trace context
//!   header when one is present
//! - Auto-populate method/path/status-code attributes
//! - Map response classes to span status (5xx → error, 4xx → warning)
//! - Expose the request's trace context via request extensions

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::span::{AttrValue, ErrorInfo, OperationCategory, SpanStatus, TraceContext};
use crate::tracer::Tracer;

/// Axum middleware wrapping every request in a span. Installed with
/// `middleware::from_fn_with_state(tracer, trace_request)`.
pub async fn trace_request(
    State(tracer): State<Arc<Tracer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let parent = TraceContext::extract(request.headers());
    let mut flow = tracer.flow_from(parent);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mut attributes = BTreeMap::new();
    attributes.insert("http.method".to_string(), AttrValue::from(method.as_str()));
    attributes.insert("http.path".to_string(), AttrValue::from(path.clone()));

    let handle = flow.start_span_with(
        format!("{} {}", method, path),
        OperationCategory::NetworkCall,
        attributes,
    );

    // Handlers and outbound calls downstream pick this up for propagation.
    if let Some(ctx) = flow.current_trace_context() {
        request.extensions_mut().insert(ctx);
    }

    let response = next.run(request).await;

    let status_code = response.status();
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "http.status_code".to_string(),
        AttrValue::from(u64::from(status_code.as_u16())),
    );
    flow.add_attributes(handle, attributes);

    let (status, error_info) = if status_code.is_server_error() {
        (
            SpanStatus::Error,
            Some(ErrorInfo::new(
                "http_server_error",
                format!("{} {} returned {}", method, path, status_code),
            )),
        )
    } else if status_code.is_client_error() {
        (SpanStatus::Warning, None)
    } else {
        (SpanStatus::Success, None)
    };
    flow.end_span(handle, status, error_info);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, FileStore, QueryFilter};
    use crate::config::CollectorConfig;
    use axum::http::StatusCode;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_stack(dir: &std::path::Path) -> (Router, Arc<Collector>) {
        let collector = Arc::new(Collector::new(
            CollectorConfig::default(),
            FileStore::new(dir),
        ));
        let tracer = Arc::new(Tracer::new("svc", Arc::clone(&collector)));
        let router = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/boom",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .layer(middleware::from_fn_with_state(tracer, trace_request));
        (router, collector)
    }

    #[tokio::test]
    async fn records_a_span_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let (router, collector) = test_stack(dir.path());

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = collector.query(&QueryFilter::last_hours(1)).await.unwrap();
        assert_eq!(records.len(), 1);
        let span = &records[0].span;
        assert_eq!(span.operation_name, "GET /ok");
        assert_eq!(span.status, SpanStatus::Success);
        assert_eq!(
            span.attributes.get("http.status_code"),
            Some(&AttrValue::Number(200.0))
        );
        assert!(span.parent_span_id.is_none());
    }

    #[tokio::test]
    async fn server_errors_mark_the_span_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let (router, collector) = test_stack(dir.path());

        router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let records = collector.query(&QueryFilter::last_hours(1)).await.unwrap();
        let span = &records[0].span;
        assert_eq!(span.status, SpanStatus::Error);
        assert_eq!(
            span.error_info.as_ref().unwrap().error_type,
            "http_server_error"
        );
    }

    #[tokio::test]
    async fn incoming_context_header_makes_a_child_span() {
        let dir = tempfile::tempdir().unwrap();
        let (router, collector) = test_stack(dir.path());

        let ctx = TraceContext {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
        };
        let mut request = axum::http::Request::builder()
            .uri("/ok")
            .body(Body::empty())
            .unwrap();
        ctx.inject(request.headers_mut());

        router.oneshot(request).await.unwrap();

        let records = collector.query(&QueryFilter::last_hours(1)).await.unwrap();
        let span = &records[0].span;
        assert_eq!(span.trace_id, ctx.trace_id);
        assert_eq!(span.parent_span_id, Some(ctx.span_id));
    }
}
