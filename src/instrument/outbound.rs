//! Outbound and persistence call instrumentation.
//!
//! # Responsibilities
//! - Open a child span named by target (table, downstream host)
//! - Inject the current trace context into outbound headers
//! - End the span from the call's `Result`

use axum::http::HeaderMap;
use std::future::Future;

use crate::span::{ErrorInfo, OperationCategory, SpanStatus};
use crate::tracer::FlowTracer;

/// Wrap an outbound or persistence call in a child span. The wrapped
/// future's result is returned untouched; the span status mirrors it.
pub async fn traced_call<F, T, E>(
    flow: &mut FlowTracer,
    target: &str,
    category: OperationCategory,
    call: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let handle = flow.start_span(target, category);
    let result = call.await;
    match &result {
        Ok(_) => flow.end_span(handle, SpanStatus::Success, None),
        Err(e) => flow.end_span(
            handle,
            SpanStatus::Error,
            Some(ErrorInfo::new(error_type_for(category), e.to_string())),
        ),
    }
    result
}

/// Copy the flow's current context into outbound request headers, when a
/// span is active. Callers on the receiving side reconstruct the parent
/// from these headers.
pub fn inject_context(flow: &FlowTracer, headers: &mut HeaderMap) {
    if let Some(ctx) = flow.current_trace_context() {
        ctx.inject(headers);
    }
}

fn error_type_for(category: OperationCategory) -> &'static str {
    match category {
        OperationCategory::Persistence => "persistence_error",
        OperationCategory::Cache => "cache_error",
        OperationCategory::Io => "io_error",
        _ => "call_failed",
    }
}
