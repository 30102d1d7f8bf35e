//! Instrumentation adapters.
//!
//! # Data Flow
//! ```text
//! inbound request  → http.rs (middleware: root-or-child span per request)
//! outbound call    → outbound.rs (child span + context header injection)
//! queued task      → task.rs (context captured at enqueue, re-established
//!                    as the parent when the task's own flow starts)
//! ```
//!
//! # Design Decisions
//! - Adapters never fail the wrapped operation; span bookkeeping problems
//!   are logged and swallowed
//! - Each adapter owns its flow's tracer for exactly the wrapped scope

pub mod http;
pub mod outbound;
pub mod task;
