//! Read-only statistics engine over collected spans.
//!
//! # Responsibilities
//! - Performance percentiles, error breakdowns, per-service metrics,
//!   trend time series, slow-operation ranking, composite health score
//!
//! # Design Decisions
//! - Stateless: every computation runs over a single collector query
//!   snapshot, never re-querying mid-computation
//! - The health formula is a deliberate, explainable weighting and is
//!   reproduced exactly — dashboards depend on its output
//! - Percentile index is `ceil(p/100 * n) - 1`, clamped to `[0, n-1]`

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::collector::{Collector, CollectorError, QueryFilter};
use crate::config::AnalyzerConfig;
use crate::span::{SpanRecord, SpanStatus};

/// Performance metrics for one (service, window) selection.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub service_name: Option<String>,
    pub window_hours: u32,
    pub span_count: u64,
    pub completed_count: u64,
    pub avg_duration_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Error spans grouped by type and by service.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub window_hours: u32,
    pub total_spans: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub by_type: BTreeMap<String, u64>,
    pub by_service: BTreeMap<String, u64>,
}

/// Per-service metrics including observed downstream dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub service_name: String,
    pub request_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub operation_count: u64,
    pub downstream: Vec<String>,
}

/// One point of the trend time series.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub span_count: u64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub window_hours: u32,
    pub interval_minutes: u32,
    pub points: Vec<TrendPoint>,
}

/// One entry of the slow-operation ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SlowOperation {
    pub service_name: String,
    pub operation_name: String,
    pub span_count: u64,
    pub avg_duration_ms: f64,
    pub p95_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub window_hours: u32,
    pub total_spans: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub service_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub health_score: f64,
    pub status: HealthStatus,
    pub details: HealthDetails,
}

/// Stateless analysis engine over the collector's read API.
pub struct Analyzer {
    collector: Arc<Collector>,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(collector: Arc<Collector>, config: AnalyzerConfig) -> Self {
        Self { collector, config }
    }

    pub fn default_window_hours(&self) -> u32 {
        self.config.default_window_hours
    }

    pub fn max_window_hours(&self) -> u32 {
        self.config.max_window_hours
    }

    pub async fn performance(
        &self,
        service_name: Option<&str>,
        hours: u32,
    ) -> Result<PerformanceReport, CollectorError> {
        let records = self.snapshot(service_name, hours).await?;
        let durations = sorted_durations(&records);
        Ok(PerformanceReport {
            service_name: service_name.map(str::to_string),
            window_hours: hours,
            span_count: records.len() as u64,
            completed_count: durations.len() as u64,
            avg_duration_ms: mean(&durations),
            p50_ms: percentile(&durations, 50.0),
            p95_ms: percentile(&durations, 95.0),
            p99_ms: percentile(&durations, 99.0),
        })
    }

    pub async fn errors(&self, hours: u32) -> Result<ErrorReport, CollectorError> {
        let records = self.snapshot(None, hours).await?;
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_service: BTreeMap<String, u64> = BTreeMap::new();
        let mut error_count = 0u64;

        for record in &records {
            if record.span.status != SpanStatus::Error {
                continue;
            }
            error_count += 1;
            let error_type = record
                .span
                .error_info
                .as_ref()
                .map(|e| e.error_type.clone())
                .unwrap_or_else(|| "unknown".to_string());
            *by_type.entry(error_type).or_default() += 1;
            *by_service.entry(record.span.service_name.clone()).or_default() += 1;
        }

        Ok(ErrorReport {
            window_hours: hours,
            total_spans: records.len() as u64,
            error_count,
            error_rate: rate(error_count, records.len() as u64),
            by_type,
            by_service,
        })
    }

    pub async fn services(&self, hours: u32) -> Result<Vec<ServiceReport>, CollectorError> {
        let records = self.snapshot(None, hours).await?;

        // Dependency edges come from parent/child pairs that cross a
        // service boundary within the snapshot.
        let span_services: HashMap<Uuid, &str> = records
            .iter()
            .map(|r| (r.span.span_id, r.span.service_name.as_str()))
            .collect();
        let mut downstream: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for record in &records {
            let Some(parent_id) = record.span.parent_span_id else {
                continue;
            };
            if let Some(&parent_service) = span_services.get(&parent_id) {
                if parent_service != record.span.service_name {
                    downstream
                        .entry(parent_service)
                        .or_default()
                        .insert(record.span.service_name.as_str());
                }
            }
        }

        let mut grouped: BTreeMap<&str, Vec<&SpanRecord>> = BTreeMap::new();
        for record in &records {
            grouped
                .entry(record.span.service_name.as_str())
                .or_default()
                .push(record);
        }

        let mut reports: Vec<ServiceReport> = grouped
            .into_iter()
            .map(|(service, spans)| {
                let errors = spans
                    .iter()
                    .filter(|r| r.span.status == SpanStatus::Error)
                    .count() as u64;
                let durations: Vec<f64> =
                    spans.iter().filter_map(|r| r.span.duration_ms).collect();
                let operations: BTreeSet<&str> = spans
                    .iter()
                    .map(|r| r.span.operation_name.as_str())
                    .collect();
                ServiceReport {
                    service_name: service.to_string(),
                    request_count: spans.len() as u64,
                    error_count: errors,
                    error_rate: rate(errors, spans.len() as u64),
                    avg_duration_ms: mean(&durations),
                    operation_count: operations.len() as u64,
                    downstream: downstream
                        .get(service)
                        .map(|set| set.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        reports.sort_by(|a, b| {
            b.request_count
                .cmp(&a.request_count)
                .then_with(|| a.service_name.cmp(&b.service_name))
        });
        Ok(reports)
    }

    pub async fn trends(
        &self,
        hours: u32,
        interval_minutes: u32,
    ) -> Result<TrendReport, CollectorError> {
        // A zero interval cannot bucket anything; clamp to one minute.
        let interval_minutes = interval_minutes.max(1);
        let filter = self.window_filter(None, hours);
        let records = self.collector.query(&filter).await?;

        let interval_ms = i64::from(interval_minutes) * 60_000;
        let start_ms = filter.since.timestamp_millis() / interval_ms * interval_ms;
        let end_ms = filter.until.timestamp_millis();
        let bucket_count = ((end_ms - start_ms) / interval_ms + 1) as usize;

        let mut counts = vec![0u64; bucket_count];
        let mut sums = vec![0f64; bucket_count];
        for record in &records {
            let ts = record.span.start_time.timestamp_millis();
            if ts < start_ms || ts > end_ms {
                continue;
            }
            let idx = ((ts - start_ms) / interval_ms) as usize;
            counts[idx] += 1;
            sums[idx] += record.span.duration_ms.unwrap_or(0.0);
        }

        let points = (0..bucket_count)
            .map(|i| TrendPoint {
                bucket_start: DateTime::<Utc>::from_timestamp_millis(
                    start_ms + i as i64 * interval_ms,
                )
                .unwrap_or(filter.since),
                span_count: counts[i],
                avg_duration_ms: if counts[i] > 0 {
                    sums[i] / counts[i] as f64
                } else {
                    0.0
                },
            })
            .collect();

        Ok(TrendReport {
            window_hours: hours,
            interval_minutes,
            points,
        })
    }

    pub async fn slow_operations(
        &self,
        hours: u32,
        limit: usize,
    ) -> Result<Vec<SlowOperation>, CollectorError> {
        let records = self.snapshot(None, hours).await?;

        let mut grouped: BTreeMap<(&str, &str), Vec<&SpanRecord>> = BTreeMap::new();
        for record in &records {
            grouped
                .entry((
                    record.span.service_name.as_str(),
                    record.span.operation_name.as_str(),
                ))
                .or_default()
                .push(record);
        }

        let mut ranked: Vec<SlowOperation> = grouped
            .into_iter()
            .map(|((service, operation), spans)| {
                let mut durations: Vec<f64> =
                    spans.iter().filter_map(|r| r.span.duration_ms).collect();
                durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let errors = spans
                    .iter()
                    .filter(|r| r.span.status == SpanStatus::Error)
                    .count() as u64;
                SlowOperation {
                    service_name: service.to_string(),
                    operation_name: operation.to_string(),
                    span_count: spans.len() as u64,
                    avg_duration_ms: mean(&durations),
                    p95_ms: percentile(&durations, 95.0),
                    error_rate: rate(errors, spans.len() as u64),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.avg_duration_ms
                .partial_cmp(&a.avg_duration_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.operation_name.cmp(&b.operation_name))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn health(&self, hours: u32) -> Result<HealthReport, CollectorError> {
        let records = self.snapshot(None, hours).await?;
        let error_count = records
            .iter()
            .filter(|r| r.span.status == SpanStatus::Error)
            .count() as u64;
        let durations = sorted_durations(&records);
        let error_rate = rate(error_count, records.len() as u64);
        let avg_duration_ms = mean(&durations);
        let services: BTreeSet<&str> = records
            .iter()
            .map(|r| r.span.service_name.as_str())
            .collect();

        let score = health_score(error_rate, avg_duration_ms);
        Ok(HealthReport {
            health_score: score,
            status: status_for(score),
            details: HealthDetails {
                window_hours: hours,
                total_spans: records.len() as u64,
                error_count,
                error_rate,
                avg_duration_ms,
                service_count: services.len() as u64,
            },
        })
    }

    fn window_filter(&self, service_name: Option<&str>, hours: u32) -> QueryFilter {
        let mut filter = QueryFilter::last_hours(hours);
        filter.service_name = service_name.map(str::to_string);
        filter.limit = self.config.max_scan_records;
        filter
    }

    async fn snapshot(
        &self,
        service_name: Option<&str>,
        hours: u32,
    ) -> Result<Vec<SpanRecord>, CollectorError> {
        self.collector
            .query(&self.window_filter(service_name, hours))
            .await
    }
}

/// Percentile over an ascending-sorted duration set:
/// `index = ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let index = ((pct / 100.0 * n as f64).ceil() as usize)
        .saturating_sub(1)
        .min(n - 1);
    sorted[index]
}

/// The composite health formula. Error rate dominates at a 10x rate versus
/// duration's /10 scaling; both terms clamp at zero before weighting.
pub(crate) fn health_score(error_rate: f64, avg_duration_ms: f64) -> f64 {
    let error_score = (100.0 - error_rate * 10.0).max(0.0);
    let performance_score = (100.0 - avg_duration_ms / 10.0).max(0.0);
    error_score * 0.6 + performance_score * 0.4
}

pub(crate) fn status_for(score: f64) -> HealthStatus {
    if score >= 90.0 {
        HealthStatus::Healthy
    } else if score >= 70.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

fn sorted_durations(records: &[SpanRecord]) -> Vec<f64> {
    let mut durations: Vec<f64> = records.iter().filter_map(|r| r.span.duration_ms).collect();
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    durations
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FileStore;
    use crate::config::CollectorConfig;
    use crate::span::{ErrorInfo, OperationCategory, Span};
    use std::collections::BTreeMap as Map;

    #[test]
    fn percentile_uses_the_exact_index_formula() {
        let durations: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert_eq!(percentile(&durations, 50.0), 50.0);
        assert_eq!(percentile(&durations, 95.0), 95.0);
        assert_eq!(percentile(&durations, 99.0), 99.0);

        let single = [42.0];
        assert_eq!(percentile(&single, 50.0), 42.0);
        assert_eq!(percentile(&single, 99.0), 42.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn percentiles_are_monotonic() {
        let mut durations = vec![3.0, 1.0, 120.0, 7.5, 7.5, 0.2, 55.0];
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p50 = percentile(&durations, 50.0);
        let p95 = percentile(&durations, 95.0);
        let p99 = percentile(&durations, 99.0);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
    }

    #[test]
    fn health_score_is_pure_and_exact() {
        assert_eq!(health_score(0.0, 0.0), 100.0);
        assert_eq!(status_for(health_score(0.0, 0.0)), HealthStatus::Healthy);

        // error_rate = 20 → error term clamps to zero, so the score can
        // never leave critical regardless of the performance term.
        let score = health_score(20.0, 0.0);
        assert_eq!(score, 40.0);
        assert_eq!(status_for(score), HealthStatus::Critical);

        assert_eq!(health_score(5.0, 500.0), 50.0);
        assert_eq!(status_for(90.0), HealthStatus::Healthy);
        assert_eq!(status_for(89.999), HealthStatus::Warning);
        assert_eq!(status_for(70.0), HealthStatus::Warning);
        assert_eq!(status_for(69.999), HealthStatus::Critical);
    }

    fn span(service: &str, operation: &str, duration_ms: f64, status: SpanStatus) -> Span {
        Span {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            service_name: service.to_string(),
            operation_name: operation.to_string(),
            operation_category: OperationCategory::Other,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            duration_ms: Some(duration_ms),
            status,
            attributes: Map::new(),
            error_info: None,
        }
    }

    fn analyzer(dir: &std::path::Path) -> (Analyzer, Arc<Collector>) {
        let collector = Arc::new(Collector::new(
            CollectorConfig::default(),
            FileStore::new(dir),
        ));
        (
            Analyzer::new(Arc::clone(&collector), AnalyzerConfig::default()),
            collector,
        )
    }

    #[tokio::test]
    async fn error_rate_twenty_percent_is_critical() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());

        for i in 0..10 {
            let status = if i < 2 { SpanStatus::Error } else { SpanStatus::Success };
            let mut s = span("A", "op", 1.0, status);
            if status == SpanStatus::Error {
                s.error_info = Some(ErrorInfo::new("boom", "failed"));
            }
            collector.ingest(s);
        }

        let errors = analyzer.errors(1).await.unwrap();
        assert_eq!(errors.error_rate, 20.0);
        assert_eq!(errors.by_type.get("boom"), Some(&2));
        assert_eq!(errors.by_service.get("A"), Some(&2));

        let health = analyzer.health(1).await.unwrap();
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.details.error_rate, 20.0);
    }

    #[tokio::test]
    async fn service_report_derives_dependency_edges() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());

        let parent = span("gateway", "GET /make", 10.0, SpanStatus::Success);
        let mut child = span("image-service", "generate", 200.0, SpanStatus::Success);
        child.trace_id = parent.trace_id;
        child.parent_span_id = Some(parent.span_id);
        collector.ingest(parent);
        collector.ingest(child);

        let reports = analyzer.services(1).await.unwrap();
        assert_eq!(reports.len(), 2);
        let gateway = reports
            .iter()
            .find(|r| r.service_name == "gateway")
            .unwrap();
        assert_eq!(gateway.downstream, vec!["image-service".to_string()]);
        let image = reports
            .iter()
            .find(|r| r.service_name == "image-service")
            .unwrap();
        assert!(image.downstream.is_empty());
        assert_eq!(image.operation_count, 1);
    }

    #[tokio::test]
    async fn slow_operations_rank_by_average_duration() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());

        for _ in 0..3 {
            collector.ingest(span("A", "fast", 5.0, SpanStatus::Success));
        }
        collector.ingest(span("A", "slow", 900.0, SpanStatus::Error));
        collector.ingest(span("B", "medium", 100.0, SpanStatus::Success));

        let ranked = analyzer.slow_operations(1, 2).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].operation_name, "slow");
        assert_eq!(ranked[0].error_rate, 100.0);
        assert_eq!(ranked[1].operation_name, "medium");
    }

    #[tokio::test]
    async fn trends_bucket_counts_and_averages() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());

        collector.ingest(span("A", "op", 10.0, SpanStatus::Success));
        collector.ingest(span("A", "op", 30.0, SpanStatus::Success));

        let report = analyzer.trends(1, 5).await.unwrap();
        assert_eq!(report.interval_minutes, 5);
        assert!(!report.points.is_empty());
        let total: u64 = report.points.iter().map(|p| p.span_count).sum();
        assert_eq!(total, 2);
        let busy = report.points.iter().find(|p| p.span_count == 2).unwrap();
        assert_eq!(busy.avg_duration_ms, 20.0);
    }

    #[tokio::test]
    async fn trends_clamp_a_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());
        collector.ingest(span("A", "op", 10.0, SpanStatus::Success));

        let report = analyzer.trends(1, 0).await.unwrap();
        assert_eq!(report.interval_minutes, 1);
        let total: u64 = report.points.iter().map(|p| p.span_count).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn performance_report_over_one_service() {
        let dir = tempfile::tempdir().unwrap();
        let (analyzer, collector) = analyzer(dir.path());

        for v in [10.0, 20.0, 30.0, 40.0] {
            collector.ingest(span("A", "op", v, SpanStatus::Success));
        }
        collector.ingest(span("B", "noise", 999.0, SpanStatus::Success));

        let report = analyzer.performance(Some("A"), 1).await.unwrap();
        assert_eq!(report.span_count, 4);
        assert_eq!(report.avg_duration_ms, 25.0);
        assert_eq!(report.p50_ms, 20.0);
        assert_eq!(report.p99_ms, 40.0);
    }
}
