//! telemetry_sink: resilient, non-blocking telemetry logging into SQLite
//!
//! Application code records system messages, errors, operation timings and
//! data collection progress without waiting on the database. Each table has
//! its own bounded queue and background writer that batches entries, guards
//! the database with a circuit breaker and diverts to local fallback files
//! when writes fail.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use telemetry_sink::{ContextSettings, LoggingContext};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = LoggingContext::connect(
//!     ContextSettings::new("sqlite:telemetry.db").with_fallback_dir("logs"),
//! )
//! .await?;
//!
//! let timer = context.performance().start_timer("daily_prices", "collector");
//! let id = context.data_collection().log_started("AAPL", "yahoo", "daily_prices");
//! context.data_collection().log_success(
//!     "AAPL",
//!     "yahoo",
//!     "daily_prices",
//!     252,
//!     timer.elapsed(),
//!     Some(&id),
//! );
//! timer.finish(true, Some(252));
//!
//! context.shutdown().await;
//! println!("{}", serde_json::to_string_pretty(&context.stats())?);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! Loggers spawn their writers on the current Tokio runtime, so they must be
//! created from within one.

pub mod config;
mod error_handling;
pub mod initialization;
pub mod logger;
pub mod specialized;
pub mod storage;

// Re-export public API
pub use config::{
    BreakerConfig, ContextSettings, LogFormat, LogLevel, LoggerConfig, OverflowPolicy, PoolConfig,
};
pub use error_handling::{DatabaseError, FallbackError, InitializationError, PoolError, WriteError};
pub use logger::{
    read_fallback_file, replay_fallback_file, replay_table, Diagnostic, LogOutcome, LogStore,
    LoggerStats, ResilientDatabaseLogger, SqlLogStore,
};
pub use specialized::{
    ContextStats, DataCollectionLogger, ErrorLogger, LoggingContext, OperationTimer,
    PerformanceLogger, SystemLogger,
};
pub use storage::{
    create_log_tables, CircuitBreaker, CircuitBreakerStats, CircuitState, CollectionStatus,
    ConnectionPoolManager, DataCollectionLogEntry, ErrorLogEntry, LogEntry, PerformanceLogEntry,
    PoolStatus, Severity, SystemLogEntry, TableKind,
};
