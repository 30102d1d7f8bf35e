//! Trace context propagation token.
//!
//! # Responsibilities
//! - Carry `{trace_id, span_id}` across service and flow boundaries
//! - Inject into / extract from HTTP headers
//!
//! # Design Decisions
//! - Propagation is always explicit: the token travels in headers or
//!   alongside task payloads, never through thread/task-local state

use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the trace id of the calling request.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Header carrying the span id of the calling span (the parent on the
/// receiving side).
pub const X_PARENT_SPAN: &str = "x-parent-span";

/// Serializable propagation token for cross-service and cross-flow parenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
}

impl TraceContext {
    /// Write the context into outbound request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        // Uuid's hyphenated form is always a valid header value.
        if let Ok(v) = HeaderValue::from_str(&self.trace_id.to_string()) {
            headers.insert(X_TRACE_ID, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.span_id.to_string()) {
            headers.insert(X_PARENT_SPAN, v);
        }
    }

    /// Read a context from inbound request headers, if present and valid.
    pub fn extract(headers: &HeaderMap) -> Option<Self> {
        let trace_id = headers
            .get(X_TRACE_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())?;
        let span_id = headers
            .get(X_PARENT_SPAN)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())?;
        Some(Self { trace_id, span_id })
    }
}
