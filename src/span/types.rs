//! Core span types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Category of the operation a span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationCategory {
    NetworkCall,
    Persistence,
    BackgroundTask,
    Cache,
    Io,
    Other,
}

impl OperationCategory {
    /// Parse a category from its wire form (e.g. "network-call").
    ///
    /// Returns `None` for unrecognized values; the query surface maps
    /// those to an empty result set rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "network-call" => Some(Self::NetworkCall),
            "persistence" => Some(Self::Persistence),
            "background-task" => Some(Self::BackgroundTask),
            "cache" => Some(Self::Cache),
            "io" => Some(Self::Io),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkCall => "network-call",
            Self::Persistence => "persistence",
            Self::BackgroundTask => "background-task",
            Self::Cache => "cache",
            Self::Io => "io",
            Self::Other => "other",
        }
    }
}

/// Lifecycle status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Active,
    Success,
    Error,
    Warning,
}

/// Scalar attribute value. Deliberately a small closed set so records
/// serialize the same way everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Error details attached to a span that ended with [`SpanStatus::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// One traced unit of work.
///
/// `trace_id` is shared by all spans of one logical request; `span_id` is
/// unique within the trace. `parent_span_id` is `None` only for the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub service_name: String,
    pub operation_name: String,
    pub operation_category: OperationCategory,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Derived at end time: `end_time - start_time` in milliseconds.
    pub duration_ms: Option<f64>,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, AttrValue>,
    pub error_info: Option<ErrorInfo>,
}

impl Span {
    pub fn is_ended(&self) -> bool {
        self.status != SpanStatus::Active
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

/// Persisted form of a span: the span plus collection metadata.
/// Append-only; deleted only by age-based cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    #[serde(flatten)]
    pub span: Span,
    pub collected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_span() -> Span {
        let mut attributes = BTreeMap::new();
        attributes.insert("user_id".to_string(), AttrValue::from("u-42"));
        attributes.insert("row_count".to_string(), AttrValue::from(17_i64));
        attributes.insert("cached".to_string(), AttrValue::from(false));
        Span {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            service_name: "admin".to_string(),
            operation_name: "GET /projects".to_string(),
            operation_category: OperationCategory::NetworkCall,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            duration_ms: Some(12.5),
            status: SpanStatus::Success,
            attributes,
            error_info: None,
        }
    }

    #[test]
    fn category_parse_round_trips() {
        for cat in [
            OperationCategory::NetworkCall,
            OperationCategory::Persistence,
            OperationCategory::BackgroundTask,
            OperationCategory::Cache,
            OperationCategory::Io,
            OperationCategory::Other,
        ] {
            assert_eq!(OperationCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(OperationCategory::parse("grpc"), None);
    }

    #[test]
    fn span_serde_round_trip() {
        let record = SpanRecord {
            span: sample_span(),
            collected_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: SpanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.span.span_id, record.span.span_id);
        assert_eq!(back.span.attributes, record.span.attributes);
        assert_eq!(back.span.status, SpanStatus::Success);
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&OperationCategory::BackgroundTask).unwrap();
        assert_eq!(json, "\"background-task\"");
    }

    #[test]
    fn attributes_stay_scalar() {
        let v: AttrValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(v, AttrValue::Number(3.5));
        let v: AttrValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttrValue::Bool(true));
        let v: AttrValue = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(v, AttrValue::String("abc".to_string()));
    }

    #[test]
    fn error_info_uses_type_key() {
        let info = ErrorInfo::new("timeout", "upstream took too long");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "timeout");
    }
}
