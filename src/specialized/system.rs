//! System logger (`system_logs`).

use log::Level;

use crate::logger::ResilientDatabaseLogger;
use crate::storage::SystemLogEntry;

/// Records free-form application messages.
pub struct SystemLogger {
    inner: ResilientDatabaseLogger<SystemLogEntry>,
    logger_name: String,
}

impl SystemLogger {
    pub fn new(inner: ResilientDatabaseLogger<SystemLogEntry>, logger_name: impl Into<String>) -> Self {
        Self {
            inner,
            logger_name: logger_name.into(),
        }
    }

    /// Queues a message and returns its correlation id.
    pub fn log(&self, level: Level, message: &str, module: Option<&str>) -> String {
        let mut entry = SystemLogEntry::new(level.as_str(), &self.logger_name, message);
        entry.module = module.map(str::to_string);
        let correlation_id = entry.correlation_id.clone();
        self.inner.log_async(entry);
        correlation_id
    }

    pub fn info(&self, message: &str) -> String {
        self.log(Level::Info, message, None)
    }

    pub fn warn(&self, message: &str) -> String {
        self.log(Level::Warn, message, None)
    }

    pub fn error(&self, message: &str) -> String {
        self.log(Level::Error, message, None)
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn inner(&self) -> &ResilientDatabaseLogger<SystemLogEntry> {
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
    struct CaptureStore(Arc<Mutex<Vec<SystemLogEntry>>>);

    #[async_trait]
    impl LogStore<SystemLogEntry> for CaptureStore {
        async fn write_batch(&mut self, batch: &[SystemLogEntry]) -> Result<(), WriteError> {
            self.0.lock().unwrap().extend_from_slice(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_levels_and_module() {
        let store = CaptureStore::default();
        let system = SystemLogger::new(
            ResilientDatabaseLogger::spawn(LoggerConfig::default(), store.clone()).unwrap(),
            "scheduler",
        );

        system.info("started");
        system.log(Level::Debug, "tick", Some("scheduler::cron"));
        system.error("stopped");
        system.inner().close().await;

        let written = store.0.lock().unwrap().clone();
        let levels: Vec<_> = written.iter().map(|e| e.level.as_str()).collect();
        assert_eq!(levels, vec!["INFO", "DEBUG", "ERROR"]);
        assert_eq!(written[1].module.as_deref(), Some("scheduler::cron"));
        assert!(written.iter().all(|e| e.logger_name == "scheduler"));
    }
}
