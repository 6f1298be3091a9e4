//! Error logger (`error_logs`).

use std::error::Error;

use serde::Serialize;
use serde_json::Value;

use crate::logger::ResilientDatabaseLogger;
use crate::storage::{ErrorLogEntry, Severity};

use super::{correlation_or_new, to_metadata};

/// An error report.
#[derive(Debug, Clone)]
pub struct ErrorEvent<'a> {
    pub error_type: &'a str,
    pub message: &'a str,
    pub component: &'a str,
    pub severity: Severity,
    pub stack_trace: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
    pub metadata: Option<Value>,
}

impl<'a> ErrorEvent<'a> {
    pub fn new(error_type: &'a str, message: &'a str, component: &'a str, severity: Severity) -> Self {
        Self {
            error_type,
            message,
            component,
            severity,
            stack_trace: None,
            correlation_id: None,
            metadata: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: &'a str) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: &'a str) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_metadata<T: Serialize + ?Sized>(mut self, metadata: &T) -> Self {
        self.metadata = Some(to_metadata(metadata));
        self
    }
}

/// Records application errors.
pub struct ErrorLogger {
    inner: ResilientDatabaseLogger<ErrorLogEntry>,
}

impl ErrorLogger {
    pub fn new(inner: ResilientDatabaseLogger<ErrorLogEntry>) -> Self {
        Self { inner }
    }

    /// Queues an error report and returns its correlation id.
    pub fn log_error(&self, event: ErrorEvent<'_>) -> String {
        let correlation_id = correlation_or_new(event.correlation_id);
        let mut entry = ErrorLogEntry::new(
            event.error_type,
            event.message,
            event.component,
            event.severity,
        );
        entry.correlation_id = correlation_id.clone();
        entry.stack_trace = event.stack_trace.map(str::to_string);
        if let Some(metadata) = event.metadata {
            entry.metadata = metadata;
        }
        self.inner.log_async(entry);
        correlation_id
    }

    /// Queues `error` with its source chain as the stack trace.
    ///
    /// The error type is the unqualified Rust type name of `E`.
    pub fn log_exception<E>(&self, component: &str, error: &E, severity: Severity) -> String
    where
        E: Error + ?Sized + 'static,
    {
        let message = error.to_string();
        let chain = source_chain(error.source());
        let mut event = ErrorEvent::new(short_type_name::<E>(), &message, component, severity);
        if !chain.is_empty() {
            event = event.with_stack_trace(&chain);
        }
        self.log_error(event)
    }

    pub fn inner(&self) -> &ResilientDatabaseLogger<ErrorLogEntry> {
        &self.inner
    }
}

/// Renders a `source()` chain, one cause per line.
fn source_chain(mut current: Option<&(dyn Error + 'static)>) -> String {
    let mut lines = Vec::new();
    while let Some(cause) = current {
        lines.push(format!("caused by: {cause}"));
        current = cause.source();
    }
    lines.join("\n")
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Keep generic arguments intact, strip the module path before them
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
