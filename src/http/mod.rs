//! HTTP server wiring.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: tracing, timeout, span-per-request)
//!     → admin router (/tracing/*)
//!     → collector / analyzer
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
