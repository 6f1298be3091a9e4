//! Typed log entries, one per telemetry table.
//!
//! Every entry carries a timestamp (stamped on enqueue when absent), a
//! correlation id and a free-form JSON `metadata` object stored as TEXT.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::query_builder::Separated;
use sqlx::Sqlite;
use uuid::Uuid;

use super::table::{LogEntry, TableKind};

/// Fresh correlation id for entries created without one.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn empty_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A general application event (`system_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub correlation_id: String,
    pub level: String,
    pub logger_name: String,
    pub message: String,
    pub module: Option<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl SystemLogEntry {
    pub fn new(
        level: impl Into<String>,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: None,
            correlation_id: new_correlation_id(),
            level: level.into(),
            logger_name: logger_name.into(),
            message: message.into(),
            module: None,
            metadata: empty_metadata(),
        }
    }
}

impl LogEntry for SystemLogEntry {
    const KIND: TableKind = TableKind::System;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.timestamp.unwrap_or_else(Utc::now))
            .push_bind(self.correlation_id.clone())
            .push_bind(self.level.clone())
            .push_bind(self.logger_name.clone())
            .push_bind(self.message.clone())
            .push_bind(self.module.clone())
            .push_bind(self.metadata.to_string());
    }
}

/// How badly an error affects the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// A failure reported by an application component (`error_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub correlation_id: String,
    pub error_type: String,
    pub error_message: String,
    pub component: String,
    pub severity: Severity,
    pub stack_trace: Option<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl ErrorLogEntry {
    pub fn new(
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        component: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            timestamp: None,
            correlation_id: new_correlation_id(),
            error_type: error_type.into(),
            error_message: error_message.into(),
            component: component.into(),
            severity,
            stack_trace: None,
            metadata: empty_metadata(),
        }
    }
}

impl LogEntry for ErrorLogEntry {
    const KIND: TableKind = TableKind::Error;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.timestamp.unwrap_or_else(Utc::now))
            .push_bind(self.correlation_id.clone())
            .push_bind(self.error_type.clone())
            .push_bind(self.error_message.clone())
            .push_bind(self.component.clone())
            .push_bind(self.severity.as_str())
            .push_bind(self.stack_trace.clone())
            .push_bind(self.metadata.to_string());
    }
}

/// Timing of one application operation (`performance_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub correlation_id: String,
    pub operation: String,
    pub component: String,
    pub duration_ms: f64,
    pub success: bool,
    pub records_processed: Option<i64>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl PerformanceLogEntry {
    pub fn new(
        operation: impl Into<String>,
        component: impl Into<String>,
        duration_ms: f64,
        success: bool,
    ) -> Self {
        Self {
            timestamp: None,
            correlation_id: new_correlation_id(),
            operation: operation.into(),
            component: component.into(),
            duration_ms,
            success,
            records_processed: None,
            metadata: empty_metadata(),
        }
    }
}

impl LogEntry for PerformanceLogEntry {
    const KIND: TableKind = TableKind::Performance;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.timestamp.unwrap_or_else(Utc::now))
            .push_bind(self.correlation_id.clone())
            .push_bind(self.operation.clone())
            .push_bind(self.component.clone())
            .push_bind(self.duration_ms)
            .push_bind(self.success)
            .push_bind(self.records_processed)
            .push_bind(self.metadata.to_string());
    }
}

/// Outcome of a data collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Started,
    Success,
    Partial,
    Failed,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Started => "started",
            CollectionStatus::Success => "success",
            CollectionStatus::Partial => "partial",
            CollectionStatus::Failed => "failed",
        }
    }
}

/// One data collection event for a symbol (`data_collection_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCollectionLogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub correlation_id: String,
    pub symbol: String,
    pub source: String,
    pub operation: String,
    pub status: CollectionStatus,
    pub records_collected: i64,
    pub duration_ms: Option<f64>,
    pub error_message: Option<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl DataCollectionLogEntry {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        operation: impl Into<String>,
        status: CollectionStatus,
    ) -> Self {
        Self {
            timestamp: None,
            correlation_id: new_correlation_id(),
            symbol: symbol.into(),
            source: source.into(),
            operation: operation.into(),
            status,
            records_collected: 0,
            duration_ms: None,
            error_message: None,
            metadata: empty_metadata(),
        }
    }
}

impl LogEntry for DataCollectionLogEntry {
    const KIND: TableKind = TableKind::DataCollection;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.timestamp.unwrap_or_else(Utc::now))
            .push_bind(self.correlation_id.clone())
            .push_bind(self.symbol.clone())
            .push_bind(self.source.clone())
            .push_bind(self.operation.clone())
            .push_bind(self.status.as_str())
            .push_bind(self.records_collected)
            .push_bind(self.duration_ms)
            .push_bind(self.error_message.clone())
            .push_bind(self.metadata.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entries_have_distinct_correlation_ids() {
        let a = ErrorLogEntry::new("Timeout", "fetch timed out", "collector", Severity::High);
        let b = ErrorLogEntry::new("Timeout", "fetch timed out", "collector", Severity::High);
        assert_ne!(a.correlation_id, b.correlation_id);
        assert!(a.timestamp.is_none());
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Critical).expect("serialize");
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(Severity::Critical.as_str(), "CRITICAL");
    }

    #[test]
    fn test_metadata_defaults_when_missing() {
        let json = r#"{"timestamp":null,"correlation_id":"abc","operation":"load",
            "component":"etl","duration_ms":12.5,"success":true,"records_processed":null}"#;
        let entry: PerformanceLogEntry = serde_json::from_str(json).expect("deserialize");
        assert_eq!(entry.metadata, serde_json::json!({}));
        assert_eq!(entry.correlation_id(), "abc");
    }

    #[test]
    fn test_set_timestamp() {
        let mut entry = DataCollectionLogEntry::new(
            "AAPL",
            "yahoo",
            "daily_prices",
            CollectionStatus::Started,
        );
        let now = Utc::now();
        entry.set_timestamp(now);
        assert_eq!(LogEntry::timestamp(&entry), Some(now));
    }
}
