//! Admin query surface for the tracing pipeline.
//!
//! Exposes the collector and analyzer over HTTP. Handlers perform
//! parameter validation and response shaping only; all logic lives in the
//! collector and analyzer.

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/tracing", get(list_spans))
        .route("/tracing/search", get(search_spans))
        .route("/tracing/analysis/performance", get(performance_analysis))
        .route("/tracing/analysis/errors", get(error_analysis))
        .route("/tracing/analysis/services", get(service_analysis))
        .route("/tracing/analysis/trends", get(trend_analysis))
        .route("/tracing/analysis/slow-operations", get(slow_operations))
        .route("/tracing/health", get(tracing_health))
        .route("/tracing/export", post(export_spans))
        .route("/tracing/cleanup", delete(cleanup_spans))
        .route("/tracing/stats/collector", get(collector_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
