//! Process-wide logging context.
//!
//! Owns one connection pool and the four table loggers built on it. Create
//! it once at startup and pass it (or an `Arc` of it) to whatever needs to
//! log; call [`LoggingContext::shutdown`] before exiting.

use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::config::ContextSettings;
use crate::error_handling::InitializationError;
use crate::logger::{LoggerStats, ResilientDatabaseLogger};
use crate::storage::{ConnectionPoolManager, PoolStatus};

use super::{DataCollectionLogger, ErrorLogger, PerformanceLogger, SystemLogger};

/// Statistics of every logger in a [`LoggingContext`].
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub pool: PoolStatus,
    pub system: LoggerStats,
    pub error: LoggerStats,
    pub performance: LoggerStats,
    pub data_collection: LoggerStats,
}

/// The pool and the four table loggers of one process.
///
/// # Example
///
/// ```no_run
/// use telemetry_sink::{ContextSettings, LoggingContext, Severity};
/// use telemetry_sink::specialized::ErrorEvent;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let context = LoggingContext::connect(ContextSettings::new("sqlite:telemetry.db")).await?;
///
/// context.system().info("collector started");
/// let id = context.errors().log_error(ErrorEvent::new(
///     "Timeout",
///     "quote fetch timed out",
///     "collector",
///     Severity::High,
/// ));
/// println!("logged {id}");
///
/// context.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct LoggingContext {
    pool: Arc<ConnectionPoolManager>,
    system: SystemLogger,
    errors: ErrorLogger,
    performance: PerformanceLogger,
    data_collection: DataCollectionLogger,
}

impl LoggingContext {
    /// Opens the shared pool and starts one writer per table.
    ///
    /// An unreachable database does not fail this call: the pool falls back
    /// to direct connections and the loggers route to their fallback files
    /// while writes keep failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is malformed or no tokio runtime
    /// is running.
    pub async fn connect(settings: ContextSettings) -> Result<Self, InitializationError> {
        let pool = Arc::new(ConnectionPoolManager::new(settings.pool).await?);
        let context = Self {
            system: SystemLogger::new(
                ResilientDatabaseLogger::with_pool(settings.system, Arc::clone(&pool))?,
                settings.system_logger_name,
            ),
            errors: ErrorLogger::new(ResilientDatabaseLogger::with_pool(
                settings.error,
                Arc::clone(&pool),
            )?),
            performance: PerformanceLogger::new(ResilientDatabaseLogger::with_pool(
                settings.performance,
                Arc::clone(&pool),
            )?),
            data_collection: DataCollectionLogger::new(ResilientDatabaseLogger::with_pool(
                settings.data_collection,
                Arc::clone(&pool),
            )?),
            pool,
        };
        info!(
            "Logging context ready (pool fallback mode: {})",
            context.pool.is_fallback_mode()
        );
        Ok(context)
    }

    pub fn system(&self) -> &SystemLogger {
        &self.system
    }

    pub fn errors(&self) -> &ErrorLogger {
        &self.errors
    }

    pub fn performance(&self) -> &PerformanceLogger {
        &self.performance
    }

    pub fn data_collection(&self) -> &DataCollectionLogger {
        &self.data_collection
    }

    pub fn pool(&self) -> &Arc<ConnectionPoolManager> {
        &self.pool
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            pool: self.pool.status(),
            system: self.system.inner().get_stats(),
            error: self.errors.inner().get_stats(),
            performance: self.performance.inner().get_stats(),
            data_collection: self.data_collection.inner().get_stats(),
        }
    }

    /// Flushes all four loggers concurrently.
    pub async fn flush_all(&self) {
        tokio::join!(
            self.system.inner().flush(),
            self.errors.inner().flush(),
            self.performance.inner().flush(),
            self.data_collection.inner().flush(),
        );
    }

    /// Closes all four loggers, then the pool. Safe to call more than once.
    pub async fn shutdown(&self) {
        tokio::join!(
            self.system.inner().close(),
            self.errors.inner().close(),
            self.performance.inner().close(),
            self.data_collection.inner().close(),
        );
        self.pool.close().await;
        info!("Logging context shut down");
    }
}
