//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tracing
//! service. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration for the tracing service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings (bind address, identity, timeouts).
    pub server: ServerConfig,

    /// Collector buffering and flush settings.
    pub collector: CollectorConfig,

    /// Span storage settings.
    pub storage: StorageConfig,

    /// Analyzer window settings.
    pub analyzer: AnalyzerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Service name recorded on spans this service emits for its own
    /// request handling.
    pub service_name: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            service_name: "admin-service".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Collector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Hard cap on records buffered in memory. Past this, the oldest
    /// unflushed records are evicted (flush is always attempted first).
    ///
    /// The name is kept from the original stats contract, where buffered
    /// records are counted as "memory traces".
    pub max_memory_traces: usize,

    /// Buffered record count that triggers an early flush.
    pub batch_size: usize,

    /// Periodic flush interval in seconds.
    pub flush_interval_secs: u64,

    /// Quiescence window in seconds after which a trace with no new spans
    /// is considered complete. Advisory only.
    pub quiescence_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_memory_traces: 10_000,
            batch_size: 100,
            flush_interval_secs: 10,
            quiescence_secs: 30,
        }
    }
}

/// Span storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the per-day span files.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./trace-data".to_string(),
        }
    }
}

/// Analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Default analysis window in hours when a request omits `hours`.
    pub default_window_hours: u32,

    /// Largest analysis window a request may ask for, in hours.
    pub max_window_hours: u32,

    /// Upper bound on records pulled into one analysis snapshot.
    pub max_scan_records: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_window_hours: 24,
            max_window_hours: 720,
            max_scan_records: 50_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token). Empty disables auth.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
        }
    }
}
