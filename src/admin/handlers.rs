use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::error::ApiError;
use crate::analyzer::{
    ErrorReport, HealthReport, PerformanceReport, ServiceReport, SlowOperation, TrendReport,
};
use crate::collector::{CollectorStats, QueryFilter, DEFAULT_QUERY_LIMIT};
use crate::http::server::AppState;
use crate::span::{OperationCategory, SpanRecord};

/// Largest `limit` a list/search request may ask for.
const MAX_LIMIT: usize = 1000;

/// Largest trend bucket width in minutes (one day).
const MAX_INTERVAL_MINUTES: u32 = 1440;

#[derive(Deserialize)]
pub struct ListParams {
    pub trace_id: Option<String>,
    pub service_name: Option<String>,
    pub operation_category: Option<String>,
    pub hours: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub service_name: Option<String>,
    pub hours: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct PerformanceParams {
    pub service_name: Option<String>,
    pub hours: Option<u32>,
}

#[derive(Deserialize)]
pub struct HoursParams {
    pub hours: Option<u32>,
}

#[derive(Deserialize)]
pub struct TrendParams {
    pub hours: Option<u32>,
    pub interval_minutes: Option<u32>,
}

#[derive(Deserialize)]
pub struct SlowOpsParams {
    pub hours: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Default)]
pub struct ExportParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CleanupParams {
    pub days: Option<u32>,
}

#[derive(Serialize)]
pub struct CleanupResult {
    pub deleted_count: u64,
}

pub async fn list_spans(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<SpanRecord>>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    let limit = resolve_limit(params.limit)?;

    let mut filter = QueryFilter::last_hours(hours);
    filter.limit = limit;
    filter.service_name = params.service_name;

    // Unrecognized filter values are an empty result, never an error.
    if let Some(raw) = &params.trace_id {
        match Uuid::parse_str(raw) {
            Ok(id) => filter.trace_id = Some(id),
            Err(_) => return Ok(Json(Vec::new())),
        }
    }
    if let Some(raw) = &params.operation_category {
        match OperationCategory::parse(raw) {
            Some(category) => filter.operation_category = Some(category),
            None => return Ok(Json(Vec::new())),
        }
    }

    Ok(Json(state.collector.query(&filter).await?))
}

pub async fn search_spans(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SpanRecord>>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    let limit = resolve_limit(params.limit)?;

    let mut filter = QueryFilter::last_hours(hours);
    filter.limit = limit;
    filter.service_name = params.service_name;

    Ok(Json(state.collector.search(&params.query, &filter).await?))
}

pub async fn performance_analysis(
    State(state): State<AppState>,
    Query(params): Query<PerformanceParams>,
) -> Result<Json<PerformanceReport>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    let report = state
        .analyzer
        .performance(params.service_name.as_deref(), hours)
        .await?;
    Ok(Json(report))
}

pub async fn error_analysis(
    State(state): State<AppState>,
    Query(params): Query<HoursParams>,
) -> Result<Json<ErrorReport>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    Ok(Json(state.analyzer.errors(hours).await?))
}

pub async fn service_analysis(
    State(state): State<AppState>,
    Query(params): Query<HoursParams>,
) -> Result<Json<Vec<ServiceReport>>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    Ok(Json(state.analyzer.services(hours).await?))
}

pub async fn trend_analysis(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<TrendReport>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    let interval = params.interval_minutes.unwrap_or(60);
    if interval == 0 || interval > MAX_INTERVAL_MINUTES {
        return Err(ApiError::BadRequest(format!(
            "interval_minutes must be between 1 and {}",
            MAX_INTERVAL_MINUTES
        )));
    }
    Ok(Json(state.analyzer.trends(hours, interval).await?))
}

pub async fn slow_operations(
    State(state): State<AppState>,
    Query(params): Query<SlowOpsParams>,
) -> Result<Json<Vec<SlowOperation>>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    let limit = resolve_limit(params.limit)?;
    Ok(Json(state.analyzer.slow_operations(hours, limit).await?))
}

pub async fn tracing_health(
    State(state): State<AppState>,
    Query(params): Query<HoursParams>,
) -> Result<Json<HealthReport>, ApiError> {
    let hours = resolve_hours(&state, params.hours)?;
    Ok(Json(state.analyzer.health(hours).await?))
}

/// Streams matching records as line-delimited JSON. The body is read from
/// storage lazily, so a cancelled request stops consuming and nothing
/// beyond the already-sent bytes is ever materialized.
pub async fn export_spans(
    State(state): State<AppState>,
    body: Option<Json<ExportParams>>,
) -> Result<Response, ApiError> {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let start = parse_date("start_date", params.start_date.as_deref())?;
    let end = parse_date("end_date", params.end_date.as_deref())?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ApiError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }

    let records = state.collector.export(start, end).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(records),
    )
        .into_response())
}

pub async fn cleanup_spans(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupResult>, ApiError> {
    let days = params.days.unwrap_or(30);
    if days == 0 {
        return Err(ApiError::BadRequest("days must be at least 1".to_string()));
    }
    let deleted_count = state.collector.cleanup(days).await?;
    Ok(Json(CleanupResult { deleted_count }))
}

pub async fn collector_stats(State(state): State<AppState>) -> Json<CollectorStats> {
    Json(state.collector.stats())
}

fn resolve_hours(state: &AppState, hours: Option<u32>) -> Result<u32, ApiError> {
    let max = state.analyzer.max_window_hours();
    let hours = hours.unwrap_or_else(|| state.analyzer.default_window_hours());
    if hours == 0 || hours > max {
        return Err(ApiError::BadRequest(format!(
            "hours must be between 1 and {}",
            max
        )));
    }
    Ok(hours)
}

fn resolve_limit(limit: Option<usize>) -> Result<usize, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be YYYY-MM-DD, got {:?}", field, s))),
    }
}
