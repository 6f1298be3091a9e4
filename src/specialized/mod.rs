//! Table-specific loggers.
//!
//! Each logger wraps one [`ResilientDatabaseLogger`](crate::ResilientDatabaseLogger)
//! and turns a narrow, typed call into a fully populated entry. Every call
//! returns the correlation id it attached and never fails: building an
//! entry cannot error, and metadata that does not serialize is replaced by
//! a description of the problem.

mod context;
mod data_collection;
mod error;
mod performance;
mod system;

use serde::Serialize;
use serde_json::{json, Value};

use crate::storage::new_correlation_id;

// Re-export public API
pub use context::{ContextStats, LoggingContext};
pub use data_collection::{DataCollectionEvent, DataCollectionLogger};
pub use error::{ErrorEvent, ErrorLogger};
pub use performance::{OperationTimer, PerformanceEvent, PerformanceLogger};
pub use system::SystemLogger;

/// Serializes caller metadata, never failing.
pub(crate) fn to_metadata<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(Value::Null) => json!({}),
        Ok(value) => value,
        Err(e) => {
            log::debug!("Dropping unserializable log metadata: {e}");
            json!({ "serialization_error": e.to_string() })
        }
    }
}

pub(crate) fn correlation_or_new(correlation_id: Option<&str>) -> String {
    correlation_id
        .map(str::to_string)
        .unwrap_or_else(new_correlation_id)
}
