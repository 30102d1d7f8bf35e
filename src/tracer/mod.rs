//! Tracer core: span creation and the per-flow active stack.
//!
//! # Data Flow
//! ```text
//! Tracer (shared factory, one per service)
//!     → flow() / flow_from(ctx)  (one FlowTracer per request or task)
//!     → start_span (parent = stack top, else remote context, else new root)
//!     → add_attributes (active spans only)
//!     → end_span (pop, derive duration, hand off to collector)
//! ```
//!
//! # Design Decisions
//! - One active-span stack per logical execution flow, owned by a
//!   `FlowTracer` value — never task-local or global state
//! - Crossing a flow boundary is explicit: capture
//!   `current_trace_context()` at enqueue time and rebuild from it
//! - Once a span is handed to the collector the tracer keeps no reference

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::collector::Collector;
use crate::span::{AttrValue, ErrorInfo, OperationCategory, Span, SpanStatus, TraceContext};

/// Shared span factory; cheap to clone via `Arc`.
pub struct Tracer {
    service_name: String,
    collector: Arc<Collector>,
}

impl Tracer {
    pub fn new(service_name: impl Into<String>, collector: Arc<Collector>) -> Self {
        Self {
            service_name: service_name.into(),
            collector,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Start a fresh flow with no parent; its first span becomes a root.
    pub fn flow(&self) -> FlowTracer {
        self.flow_from(None)
    }

    /// Start a flow parented on a propagated context (inbound request
    /// header, or a token captured at task enqueue time).
    pub fn flow_from(&self, parent: Option<TraceContext>) -> FlowTracer {
        FlowTracer {
            service_name: self.service_name.clone(),
            collector: Arc::clone(&self.collector),
            remote_parent: parent,
            stack: Vec::new(),
        }
    }
}

/// Opaque reference to a started span, used to end it or attach attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanHandle {
    span_id: Uuid,
}

/// The active-span stack for one logical execution flow.
///
/// Exclusively owned by that flow; nothing here is `Sync` on purpose.
pub struct FlowTracer {
    service_name: String,
    collector: Arc<Collector>,
    remote_parent: Option<TraceContext>,
    stack: Vec<Span>,
}

impl FlowTracer {
    /// Open a span. Parented on the current active span when one exists,
    /// otherwise on the flow's remote context, otherwise it roots a new
    /// trace.
    pub fn start_span(
        &mut self,
        operation_name: impl Into<String>,
        category: OperationCategory,
    ) -> SpanHandle {
        self.start_span_with(operation_name, category, BTreeMap::new())
    }

    /// Open a span with initial attributes.
    pub fn start_span_with(
        &mut self,
        operation_name: impl Into<String>,
        category: OperationCategory,
        attributes: BTreeMap<String, AttrValue>,
    ) -> SpanHandle {
        let (trace_id, parent_span_id) = match self.stack.last() {
            Some(parent) => (parent.trace_id, Some(parent.span_id)),
            None => match self.remote_parent {
                Some(ctx) => (ctx.trace_id, Some(ctx.span_id)),
                None => (Uuid::new_v4(), None),
            },
        };

        let span = Span {
            trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id,
            service_name: self.service_name.clone(),
            operation_name: operation_name.into(),
            operation_category: category,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            status: SpanStatus::Active,
            attributes,
            error_info: None,
        };
        let handle = SpanHandle {
            span_id: span.span_id,
        };
        self.stack.push(span);
        handle
    }

    /// End a span and hand it to the collector.
    ///
    /// The handle must reference the top of the stack; ending an
    /// out-of-order span is a programming error. Debug builds assert on
    /// it; release builds pop down to the handle's frame, closing the
    /// abandoned frames with `warning` status so they are not lost.
    pub fn end_span(&mut self, handle: SpanHandle, status: SpanStatus, error_info: Option<ErrorInfo>) {
        let Some(position) = self
            .stack
            .iter()
            .rposition(|s| s.span_id == handle.span_id)
        else {
            tracing::warn!(span_id = %handle.span_id, "end_span on unknown or already-ended span");
            return;
        };

        if position != self.stack.len() - 1 {
            debug_assert!(
                false,
                "out-of-order end_span: {} is not the top of the active stack",
                handle.span_id
            );
            let abandoned = self.stack.split_off(position + 1);
            tracing::warn!(
                count = abandoned.len(),
                span_id = %handle.span_id,
                "out-of-order end_span; closing abandoned frames as warnings"
            );
            for frame in abandoned {
                self.finish(frame, SpanStatus::Warning, None);
            }
        }

        let span = match self.stack.pop() {
            Some(s) => s,
            None => return,
        };
        let status = if status == SpanStatus::Active {
            tracing::warn!(span_id = %handle.span_id, "end_span with active status; recording success");
            SpanStatus::Success
        } else {
            status
        };
        self.finish(span, status, error_info);
    }

    /// Merge attributes into an active span. A logged no-op once the span
    /// has ended — ended spans are immutable.
    pub fn add_attributes(&mut self, handle: SpanHandle, attributes: BTreeMap<String, AttrValue>) {
        match self.stack.iter_mut().find(|s| s.span_id == handle.span_id) {
            Some(span) => span.attributes.extend(attributes),
            None => {
                tracing::debug!(span_id = %handle.span_id, "attributes dropped; span already ended");
            }
        }
    }

    /// The propagation token for the current position in this flow: the
    /// active span if one exists, else the flow's remote parent.
    pub fn current_trace_context(&self) -> Option<TraceContext> {
        self.stack
            .last()
            .map(|s| TraceContext {
                trace_id: s.trace_id,
                span_id: s.span_id,
            })
            .or(self.remote_parent)
    }

    pub fn active_depth(&self) -> usize {
        self.stack.len()
    }

    fn finish(&self, mut span: Span, status: SpanStatus, error_info: Option<ErrorInfo>) {
        let end_time = Utc::now();
        let elapsed = end_time - span.start_time;
        span.end_time = Some(end_time);
        span.duration_ms = Some(
            elapsed
                .num_microseconds()
                .map(|us| us as f64 / 1000.0)
                .unwrap_or_else(|| elapsed.num_milliseconds() as f64),
        );
        span.status = status;
        if status == SpanStatus::Error {
            span.error_info = error_info;
        } else if error_info.is_some() {
            tracing::warn!(span_id = %span.span_id, "error_info ignored for non-error status");
        }
        self.collector.ingest(span);
    }
}

impl Drop for FlowTracer {
    fn drop(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        tracing::warn!(
            count = self.stack.len(),
            "flow dropped with unclosed spans; closing as warnings"
        );
        while let Some(span) = self.stack.pop() {
            self.finish(span, SpanStatus::Warning, None);
        }
    }
}
