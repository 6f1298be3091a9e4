//! Data collection logger (`data_collection_logs`).

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::logger::ResilientDatabaseLogger;
use crate::storage::{CollectionStatus, DataCollectionLogEntry};

use super::{correlation_or_new, to_metadata};

/// One step of collecting data for a symbol from a source.
#[derive(Debug, Clone)]
pub struct DataCollectionEvent<'a> {
    pub symbol: &'a str,
    pub source: &'a str,
    pub operation: &'a str,
    pub status: CollectionStatus,
    pub records_collected: i64,
    pub duration: Option<Duration>,
    pub error_message: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
    pub metadata: Option<Value>,
}

impl<'a> DataCollectionEvent<'a> {
    pub fn new(
        symbol: &'a str,
        source: &'a str,
        operation: &'a str,
        status: CollectionStatus,
    ) -> Self {
        Self {
            symbol,
            source,
            operation,
            status,
            records_collected: 0,
            duration: None,
            error_message: None,
            correlation_id: None,
            metadata: None,
        }
    }

    pub fn with_metadata<T: Serialize + ?Sized>(mut self, metadata: &T) -> Self {
        self.metadata = Some(to_metadata(metadata));
        self
    }
}

/// Records data collection progress per symbol.
pub struct DataCollectionLogger {
    inner: ResilientDatabaseLogger<DataCollectionLogEntry>,
}

impl DataCollectionLogger {
    pub fn new(inner: ResilientDatabaseLogger<DataCollectionLogEntry>) -> Self {
        Self { inner }
    }

    /// Queues a collection event and returns its correlation id.
    pub fn log_collection(&self, event: DataCollectionEvent<'_>) -> String {
        let correlation_id = correlation_or_new(event.correlation_id);
        let mut entry =
            DataCollectionLogEntry::new(event.symbol, event.source, event.operation, event.status);
        entry.correlation_id = correlation_id.clone();
        entry.records_collected = event.records_collected;
        entry.duration_ms = event.duration.map(|d| d.as_secs_f64() * 1000.0);
        entry.error_message = event.error_message.map(str::to_string);
        if let Some(metadata) = event.metadata {
            entry.metadata = metadata;
        }
        self.inner.log_async(entry);
        correlation_id
    }

    /// Marks a collection as started. Pass the returned id to
    /// [`log_success`](Self::log_success) or [`log_failure`](Self::log_failure).
    pub fn log_started(&self, symbol: &str, source: &str, operation: &str) -> String {
        self.log_collection(DataCollectionEvent::new(
            symbol,
            source,
            operation,
            CollectionStatus::Started,
        ))
    }

    pub fn log_success(
        &self,
        symbol: &str,
        source: &str,
        operation: &str,
        records_collected: i64,
        duration: Duration,
        correlation_id: Option<&str>,
    ) -> String {
        let mut event =
            DataCollectionEvent::new(symbol, source, operation, CollectionStatus::Success);
        event.records_collected = records_collected;
        event.duration = Some(duration);
        event.correlation_id = correlation_id;
        self.log_collection(event)
    }

    pub fn log_failure(
        &self,
        symbol: &str,
        source: &str,
        operation: &str,
        error_message: &str,
        correlation_id: Option<&str>,
    ) -> String {
        let mut event =
            DataCollectionEvent::new(symbol, source, operation, CollectionStatus::Failed);
        event.error_message = Some(error_message);
        event.correlation_id = correlation_id;
        self.log_collection(event)
    }

    pub fn inner(&self) -> &ResilientDatabaseLogger<DataCollectionLogEntry> {
        &self.inner
    }
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
    struct CaptureStore(Arc<Mutex<Vec<DataCollectionLogEntry>>>);

    #[async_trait]
    impl LogStore<DataCollectionLogEntry> for CaptureStore {
        async fn write_batch(
            &mut self,
            batch: &[DataCollectionLogEntry],
        ) -> Result<(), WriteError> {
            self.0.lock().unwrap().extend_from_slice(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_started_then_success_share_correlation_id() {
        let store = CaptureStore::default();
        let logger = DataCollectionLogger::new(
            ResilientDatabaseLogger::spawn(LoggerConfig::default(), store.clone()).unwrap(),
        );

        let id = logger.log_started("AAPL", "yahoo", "daily_prices");
        let same = logger.log_success(
            "AAPL",
            "yahoo",
            "daily_prices",
            252,
            Duration::from_millis(800),
            Some(&id),
        );
        assert_eq!(id, same);
        let other = logger.log_failure("MSFT", "yahoo", "daily_prices", "HTTP 503", None);
        assert_ne!(other, id);
        logger.inner().close().await;

        let written = store.0.lock().unwrap().clone();
        let statuses: Vec<_> = written.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                CollectionStatus::Started,
                CollectionStatus::Success,
                CollectionStatus::Failed
            ]
        );
        assert_eq!(written[1].records_collected, 252);
        assert_eq!(written[1].duration_ms, Some(800.0));
        assert_eq!(written[2].error_message.as_deref(), Some("HTTP 503"));
    }
}
