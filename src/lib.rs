//! Distributed tracing pipeline for the admin service.
//!
//! # Architecture Overview
//!
//! ```text
//!    instrumented boundaries                admin API consumers
//!  ┌──────────────────────────┐          ┌─────────────────────┐
//!  │ inbound │outbound│ tasks │          │  GET /tracing/...   │
//!  └────┬─────────┬──────┬────┘          └──────────┬──────────┘
//!       │   instrument/  │                          │
//!       ▼         ▼      ▼                          ▼
//!  ┌──────────────────────────┐          ┌─────────────────────┐
//!  │        tracer/           │          │       admin/        │
//!  │  per-flow span stacks    │          │ validate + shape    │
//!  └────────────┬─────────────┘          └────┬───────────┬────┘
//!               │ completed spans             │           │
//!               ▼                             ▼           ▼
//!  ┌──────────────────────────┐          ┌─────────┐ ┌─────────┐
//!  │        collector/        │◀─────────│analyzer/│ │ stats / │
//!  │ buffer → flush → store   │  query   │         │ │ export  │
//!  └──────────────────────────┘          └─────────┘ └─────────┘
//! ```
//!
//! Cross-cutting: `config/` (validated TOML), `observability/` (logs and
//! pipeline metrics), `lifecycle/` (graceful shutdown with final flush).

// Tracing pipeline
pub mod analyzer;
pub mod collector;
pub mod instrument;
pub mod span;
pub mod tracer;

// HTTP surface
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use analyzer::Analyzer;
pub use collector::Collector;
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use span::{Span, SpanRecord, TraceContext};
pub use tracer::Tracer;
