//! Background-task instrumentation: the cross-flow propagation path.
//!
//! The enqueuing flow captures `current_trace_context()` and stores the
//! token next to the task payload; the worker rebuilds a flow from it, so
//! the task's span joins the originating trace even though it runs on a
//! different logical flow.

use std::future::Future;
use std::sync::Arc;

use crate::span::{OperationCategory, SpanStatus, TraceContext};
use crate::tracer::Tracer;

/// Run a future inside a background-task span parented on a context
/// captured at enqueue time (`None` starts a fresh trace).
pub async fn instrumented<Fut, T>(
    tracer: &Tracer,
    task_name: &str,
    parent: Option<TraceContext>,
    fut: Fut,
) -> T
where
    Fut: Future<Output = T>,
{
    let mut flow = tracer.flow_from(parent);
    let handle = flow.start_span(task_name, OperationCategory::BackgroundTask);
    let out = fut.await;
    flow.end_span(handle, SpanStatus::Success, None);
    out
}

/// Spawn an instrumented task on the runtime.
pub fn spawn_instrumented<Fut, T>(
    tracer: Arc<Tracer>,
    task_name: String,
    parent: Option<TraceContext>,
    fut: Fut,
) -> tokio::task::JoinHandle<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move { instrumented(&tracer, &task_name, parent, fut).await })
}
