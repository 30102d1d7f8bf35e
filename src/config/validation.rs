//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (batch sizes, windows, intervals)
//! - Check addresses parse before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// One semantic violation found in a config.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(err(
            "server.bind_address",
            format!("not a valid socket address: {}", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(err("server.request_timeout_secs", "must be at least 1"));
    }
    if config.server.service_name.trim().is_empty() {
        errors.push(err("server.service_name", "must not be empty"));
    }

    if config.collector.batch_size == 0 {
        errors.push(err("collector.batch_size", "must be at least 1"));
    }
    if config.collector.batch_size > config.collector.max_memory_traces {
        errors.push(err(
            "collector.batch_size",
            "must not exceed collector.max_memory_traces",
        ));
    }
    if config.collector.flush_interval_secs == 0 {
        errors.push(err("collector.flush_interval_secs", "must be at least 1"));
    }
    if config.collector.quiescence_secs == 0 {
        errors.push(err("collector.quiescence_secs", "must be at least 1"));
    }

    if config.storage.data_dir.trim().is_empty() {
        errors.push(err("storage.data_dir", "must not be empty"));
    }

    if config.analyzer.default_window_hours == 0 {
        errors.push(err("analyzer.default_window_hours", "must be at least 1"));
    }
    if config.analyzer.default_window_hours > config.analyzer.max_window_hours {
        errors.push(err(
            "analyzer.default_window_hours",
            "must not exceed analyzer.max_window_hours",
        ));
    }
    if config.analyzer.max_scan_records == 0 {
        errors.push(err("analyzer.max_scan_records", "must be at least 1"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(err(
            "observability.metrics_address",
            format!(
                "not a valid socket address: {}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
