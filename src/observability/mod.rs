//! Observability for the pipeline itself.
//!
//! # Design Decisions
//! - Structured logging via `tracing`, JSON-friendly fields everywhere
//! - Pipeline counters (ingested/dropped/flushed) are cheap metric
//!   increments exposed on an optional Prometheus endpoint
//! - Span data of the traced application is NOT routed through here; it
//!   flows through the collector

pub mod logging;
pub mod metrics;
