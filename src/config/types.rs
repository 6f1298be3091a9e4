//! Configuration types.
//!
//! This module defines the structs that parameterize loggers, the circuit
//! breaker and the connection pool. None of them read the environment; the
//! binary is the only place that turns flags into these values.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::*;
use crate::storage::TableKind;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// What a full queue does with an incoming entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Reject the incoming entry and keep everything already queued.
    #[default]
    DropNewest,
    /// Evict the oldest queued entry to make room for the incoming one.
    DropOldest,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial write is allowed
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// Configuration for one [`ResilientDatabaseLogger`](crate::ResilientDatabaseLogger).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use telemetry_sink::{LoggerConfig, TableKind};
///
/// let config = LoggerConfig {
///     batch_size: 5,
///     flush_interval: Duration::from_secs(10),
///     ..LoggerConfig::for_table(TableKind::Error)
/// };
/// assert_eq!(config.max_queue_size, 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Entries per database write
    pub batch_size: usize,
    /// Maximum time between flushes of a partially filled batch
    pub flush_interval: Duration,
    /// Capacity of the bounded queue
    pub max_queue_size: usize,
    /// Behaviour when the queue is full
    pub overflow_policy: OverflowPolicy,
    /// Circuit breaker guarding the database path
    pub breaker: BreakerConfig,
    /// Directory for `database_fallback_<table>.log` files
    pub fallback_dir: PathBuf,
    /// Upper bound on how long `flush()` waits for the queue to drain
    pub flush_timeout: Duration,
    /// Upper bound on how long `close()` waits for the writer task
    pub shutdown_timeout: Duration,
    /// Pause after an unexpected failure inside the writer loop
    pub error_backoff: Duration,
    /// Number of recent failures retained for inspection
    pub diagnostics_capacity: usize,
}

impl LoggerConfig {
    /// Returns defaults tuned to the expected volume of each table.
    ///
    /// Errors are rare and urgent, so they flush in small batches; performance
    /// samples are plentiful and tolerate latency.
    pub fn for_table(kind: TableKind) -> Self {
        let (batch_size, flush_interval) = match kind {
            TableKind::Error => (10, Duration::from_secs(2)),
            TableKind::DataCollection => (50, Duration::from_secs(5)),
            TableKind::Performance => (100, Duration::from_secs(10)),
            TableKind::System => (DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL),
        };
        Self {
            batch_size,
            flush_interval,
            ..Self::default()
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            overflow_policy: OverflowPolicy::default(),
            breaker: BreakerConfig::default(),
            fallback_dir: PathBuf::from(DEFAULT_FALLBACK_DIR),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            error_backoff: WRITER_ERROR_BACKOFF,
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// SQLite connection URL (`sqlite:path/to.db`)
    pub database_url: String,
    /// Connections opened when the pool starts
    pub min_conn: u32,
    /// Upper bound on pooled connections
    pub max_conn: u32,
    /// Timeout for establishing one connection
    pub connect_timeout: Duration,
    /// Checkout attempts before the pool is reported exhausted
    pub acquire_attempts: u32,
    /// First backoff delay after an exhausted checkout
    pub backoff_base: Duration,
    /// Cap on the backoff delay
    pub backoff_max: Duration,
    /// Create the database file if it does not exist
    pub create_if_missing: bool,
}

impl PoolConfig {
    /// Default pool settings pointed at `database_url`.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            min_conn: DEFAULT_MIN_CONNECTIONS,
            max_conn: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            acquire_attempts: DEFAULT_ACQUIRE_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            create_if_missing: true,
        }
    }
}

/// Everything needed to build a [`LoggingContext`](crate::LoggingContext).
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Pool shared by all loggers in the process
    pub pool: PoolConfig,
    /// `system_logs` writer
    pub system: LoggerConfig,
    /// `error_logs` writer
    pub error: LoggerConfig,
    /// `performance_logs` writer
    pub performance: LoggerConfig,
    /// `data_collection_logs` writer
    pub data_collection: LoggerConfig,
    /// Value stored in `system_logs.logger_name`
    pub system_logger_name: String,
}

impl ContextSettings {
    /// Per-table defaults sharing a pool on `database_url`.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            pool: PoolConfig::new(database_url),
            ..Self::default()
        }
    }

    /// Points every logger's fallback files at `dir`.
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        for config in [
            &mut self.system,
            &mut self.error,
            &mut self.performance,
            &mut self.data_collection,
        ] {
            config.fallback_dir = dir.clone();
        }
        self
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            system: LoggerConfig::for_table(TableKind::System),
            error: LoggerConfig::for_table(TableKind::Error),
            performance: LoggerConfig::for_table(TableKind::Performance),
            data_collection: LoggerConfig::for_table(TableKind::DataCollection),
            system_logger_name: DEFAULT_SYSTEM_LOGGER_NAME.to_string(),
        }
    }
}
