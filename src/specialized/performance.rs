//! Performance logger (`performance_logs`).

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

use crate::logger::ResilientDatabaseLogger;
use crate::storage::{new_correlation_id, PerformanceLogEntry};

use super::{correlation_or_new, to_metadata};

/// A completed operation.
#[derive(Debug, Clone)]
pub struct PerformanceEvent<'a> {
    pub operation: &'a str,
    pub component: &'a str,
    pub duration: Duration,
    pub success: bool,
    pub records_processed: Option<i64>,
    pub correlation_id: Option<&'a str>,
    pub metadata: Option<Value>,
}

impl<'a> PerformanceEvent<'a> {
    pub fn new(operation: &'a str, component: &'a str, duration: Duration, success: bool) -> Self {
        Self {
            operation,
            component,
            duration,
            success,
            records_processed: None,
            correlation_id: None,
            metadata: None,
        }
    }

    pub fn with_records(mut self, records: i64) -> Self {
        self.records_processed = Some(records);
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

/// Records operation timings.
pub struct PerformanceLogger {
    inner: ResilientDatabaseLogger<PerformanceLogEntry>,
}

impl PerformanceLogger {
    pub fn new(inner: ResilientDatabaseLogger<PerformanceLogEntry>) -> Self {
        Self { inner }
    }

    /// Queues a timing and returns its correlation id.
    pub fn log_operation(&self, event: PerformanceEvent<'_>) -> String {
        let correlation_id = correlation_or_new(event.correlation_id);
        let mut entry = PerformanceLogEntry::new(
            event.operation,
            event.component,
            duration_ms(event.duration),
            event.success,
        );
        entry.correlation_id = correlation_id.clone();
        entry.records_processed = event.records_processed;
        if let Some(metadata) = event.metadata {
            entry.metadata = metadata;
        }
        self.inner.log_async(entry);
        correlation_id
    }

    /// Starts timing an operation.
    ///
    /// Call [`OperationTimer::finish`] when it completes. A timer dropped
    /// without finishing is logged as a failed operation.
    pub fn start_timer(&self, operation: &str, component: &str) -> OperationTimer<'_> {
        OperationTimer {
            logger: self,
            operation: operation.to_string(),
            component: component.to_string(),
            correlation_id: new_correlation_id(),
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn inner(&self) -> &ResilientDatabaseLogger<PerformanceLogEntry> {
        &self.inner
    }
}

/// Measures one operation for a [`PerformanceLogger`].
#[must_use = "a timer logs a failed operation when dropped without `finish`"]
pub struct OperationTimer<'a> {
    logger: &'a PerformanceLogger,
    operation: String,
    component: String,
    correlation_id: String,
    started: Instant,
    finished: bool,
}

impl OperationTimer<'_> {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Logs the operation with the elapsed time and returns its correlation id.
    pub fn finish(mut self, success: bool, records_processed: Option<i64>) -> String {
        self.finished = true;
        self.record(success, records_processed, None)
    }

    fn record(&self, success: bool, records: Option<i64>, metadata: Option<Value>) -> String {
        let mut event = PerformanceEvent::new(
            &self.operation,
            &self.component,
            self.started.elapsed(),
            success,
        )
        .with_correlation_id(&self.correlation_id);
        event.records_processed = records;
        event.metadata = metadata;
        self.logger.log_operation(event)
    }
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.record(false, None, Some(json!({ "abandoned": true })));
        }
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::error_handling::WriteError;
    use crate::logger::LogStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureStore(Arc<Mutex<Vec<PerformanceLogEntry>>>);

    #[async_trait]
    impl LogStore<PerformanceLogEntry> for CaptureStore {
        async fn write_batch(&mut self, batch: &[PerformanceLogEntry]) -> Result<(), WriteError> {
            self.0.lock().unwrap().extend_from_slice(batch);
            Ok(())
        }
    }

    fn logger(store: CaptureStore) -> PerformanceLogger {
        let config = LoggerConfig {
            batch_size: 1,
            ..LoggerConfig::default()
        };
        PerformanceLogger::new(ResilientDatabaseLogger::spawn(config, store).unwrap())
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500.0);
        assert_eq!(duration_ms(Duration::from_micros(250)), 0.25);
    }

    #[tokio::test]
    async fn test_log_operation_fills_entry() {
        let store = CaptureStore::default();
        let perf = logger(store.clone());

        let id = perf.log_operation(
            PerformanceEvent::new("load", "etl", Duration::from_millis(40), true)
                .with_records(120)
                .with_metadata(&json!({"rows": "bulk"})),
        );
        perf.inner().close().await;

        let written = store.0.lock().unwrap().clone();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].correlation_id, id);
        assert_eq!(written[0].duration_ms, 40.0);
        assert_eq!(written[0].records_processed, Some(120));
        assert_eq!(written[0].metadata, json!({"rows": "bulk"}));
    }

    #[tokio::test]
    async fn test_timer_finish_and_abandon() {
        let store = CaptureStore::default();
        let perf = logger(store.clone());

        let timer = perf.start_timer("fetch", "collector");
        let finished_id = timer.correlation_id().to_string();
        assert_eq!(timer.finish(true, Some(3)), finished_id);

        let abandoned = perf.start_timer("parse", "collector");
        let abandoned_id = abandoned.correlation_id().to_string();
        drop(abandoned);
        perf.inner().close().await;

        let written = store.0.lock().unwrap().clone();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].correlation_id, finished_id);
        assert!(written[0].success);
        assert_eq!(written[0].records_processed, Some(3));
        assert_eq!(written[1].correlation_id, abandoned_id);
        assert!(!written[1].success);
        assert_eq!(written[1].metadata, json!({"abandoned": true}));
    }
}
