//! Log tables and the entry contract.
//!
//! Each telemetry table is a closed [`TableKind`] variant carrying its column
//! list and the head of its parameterized multi-row insert. Entry types tie
//! themselves to exactly one variant through [`LogEntry::KIND`], so a logger
//! can only ever write rows of the shape its table expects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::Sqlite;
use strum_macros::{EnumIter, EnumString};

/// The telemetry tables the subsystem writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString)]
pub enum TableKind {
    /// `system_logs`: general application events
    #[strum(serialize = "system_logs", serialize = "system")]
    System,
    /// `error_logs`: failures reported by application components
    #[strum(serialize = "error_logs", serialize = "error")]
    Error,
    /// `performance_logs`: operation timings
    #[strum(serialize = "performance_logs", serialize = "performance")]
    Performance,
    /// `data_collection_logs`: market data collection runs
    #[strum(serialize = "data_collection_logs", serialize = "data_collection")]
    DataCollection,
}

const SYSTEM_INSERT: &str = "INSERT INTO system_logs \
    (timestamp, correlation_id, level, logger_name, message, module, metadata) ";
const ERROR_INSERT: &str = "INSERT INTO error_logs \
    (timestamp, correlation_id, error_type, error_message, component, severity, stack_trace, metadata) ";
const PERFORMANCE_INSERT: &str = "INSERT INTO performance_logs \
    (timestamp, correlation_id, operation, component, duration_ms, success, records_processed, metadata) ";
const DATA_COLLECTION_INSERT: &str = "INSERT INTO data_collection_logs \
    (timestamp, correlation_id, symbol, source, operation, status, records_collected, duration_ms, error_message, metadata) ";

impl TableKind {
    /// Database table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::System => "system_logs",
            TableKind::Error => "error_logs",
            TableKind::Performance => "performance_logs",
            TableKind::DataCollection => "data_collection_logs",
        }
    }

    /// Columns written per row, in bind order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::System => &[
                "timestamp",
                "correlation_id",
                "level",
                "logger_name",
                "message",
                "module",
                "metadata",
            ],
            TableKind::Error => &[
                "timestamp",
                "correlation_id",
                "error_type",
                "error_message",
                "component",
                "severity",
                "stack_trace",
                "metadata",
            ],
            TableKind::Performance => &[
                "timestamp",
                "correlation_id",
                "operation",
                "component",
                "duration_ms",
                "success",
                "records_processed",
                "metadata",
            ],
            TableKind::DataCollection => &[
                "timestamp",
                "correlation_id",
                "symbol",
                "source",
                "operation",
                "status",
                "records_collected",
                "duration_ms",
                "error_message",
                "metadata",
            ],
        }
    }

    /// `INSERT INTO <table> (<columns>) ` head; rows follow as `VALUES (...), (...)`.
    pub fn insert_prefix(&self) -> &'static str {
        match self {
            TableKind::System => SYSTEM_INSERT,
            TableKind::Error => ERROR_INSERT,
            TableKind::Performance => PERFORMANCE_INSERT,
            TableKind::DataCollection => DATA_COLLECTION_INSERT,
        }
    }

    /// Name of the fallback file used when this table is unreachable.
    pub fn fallback_file_name(&self) -> String {
        format!("database_fallback_{}.log", self.table_name())
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A row destined for one telemetry table.
///
/// Implementors are plain data: serializable for the fallback file,
/// deserializable for replay, and able to bind themselves as one row of
/// their table's insert.
pub trait LogEntry: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table this entry belongs to.
    const KIND: TableKind;

    /// When the event happened, if already stamped.
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// Stamps the entry; called on enqueue when no timestamp is present.
    fn set_timestamp(&mut self, timestamp: DateTime<Utc>);

    /// Identifier tying related entries together across tables.
    fn correlation_id(&self) -> &str;

    /// Pushes this entry's values in [`TableKind::columns`] order.
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>);
}
