//! Span data model and propagation context.
//!
//! # Data Flow
//! ```text
//! tracer opens span (status = active)
//!     → types.rs (Span, attributes, status transitions)
//!     → tracer ends span (duration derived, span frozen)
//!     → collector stamps collected_at (SpanRecord)
//!
//! Cross-service propagation:
//!     context.rs (TraceContext token)
//!     → injected into outbound headers / task payloads
//!     → extracted on the receiving flow as the parent
//! ```
//!
//! # Design Decisions
//! - Attributes are a flat string-keyed map of scalar values only,
//!   keeping serialization and storage predictable
//! - A span is immutable once ended; the tracer enforces this
//! - TraceContext is explicit and serializable — never inherited
//!   implicitly across a queue boundary

pub mod context;
pub mod types;

pub use context::TraceContext;
pub use types::{AttrValue, ErrorInfo, OperationCategory, Span, SpanRecord, SpanStatus};
