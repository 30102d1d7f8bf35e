//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → injected into Collector / Analyzer / HttpServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks and
//!   reports every violation, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    AdminConfig, AnalyzerConfig, CollectorConfig, ObservabilityConfig, ServerConfig,
    ServiceConfig, StorageConfig,
};
