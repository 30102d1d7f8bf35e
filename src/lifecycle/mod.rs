//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build collector/analyzer/tracer → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Final collector flush → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: the server drains before the collector's final
//!   flush is awaited, so a clean exit persists everything buffered

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
