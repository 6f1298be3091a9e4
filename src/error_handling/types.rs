//! Error type definitions.
//!
//! This module defines the error types raised inside the logging subsystem.
//! None of them escape the public logging calls; they exist so that the
//! writer can count, route and record failures precisely.

use std::time::Duration;

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error setting up the connection pool manager.
    #[error("Connection pool initialization error: {0}")]
    PoolError(#[from] PoolError),

    /// The logging context was built outside a tokio runtime.
    #[error("No tokio runtime available to host the batch writers")]
    RuntimeError,
}

/// Error types for database operations outside the batch writer.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum DatabaseError {
    /// A connection could not be acquired.
    #[error("Connection error: {0}")]
    ConnectionError(#[from] PoolError),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// A replayed batch could not be written.
    #[error("Write error: {0}")]
    WriteError(#[from] WriteError),

    /// A fallback file could not be read.
    #[error("Fallback file error: {0}")]
    FallbackError(#[from] FallbackError),
}

/// Failures while acquiring a connection from the [`ConnectionPoolManager`](crate::ConnectionPoolManager).
#[derive(Error, Debug)]
pub enum PoolError {
    /// The database URL could not be parsed into connect options.
    #[error("Invalid database URL '{url}': {source}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parse failure reported by sqlx
        #[source]
        source: sqlx::Error,
    },

    /// Every checkout attempt found the pool exhausted.
    #[error("Connection pool exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of checkout attempts made
        attempts: u32,
    },

    /// Opening a connection failed.
    #[error("Failed to connect: {0}")]
    Connect(#[source] sqlx::Error),

    /// Opening a direct connection did not finish in time.
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The pool was closed by its owner.
    #[error("Connection pool is closed")]
    Closed,
}

impl PoolError {
    /// Whether this failure means the pool had no free connection.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. })
    }
}

/// Failures writing a batch to the database.
#[derive(Error, Debug)]
pub enum WriteError {
    /// No connection could be acquired for the write.
    #[error("Connection acquisition failed: {0}")]
    ConnectionAcquisition(#[from] PoolError),

    /// The insert itself failed.
    #[error("Batch write failed: {0}")]
    BatchWrite(#[from] sqlx::Error),

    /// A non-SQL store rejected the batch.
    #[error("Store rejected batch: {0}")]
    Rejected(String),
}

/// Failures writing to, or reading from, a fallback file.
#[derive(Error, Debug)]
pub enum FallbackError {
    /// The file could not be opened or appended to.
    #[error("Fallback file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be serialized.
    #[error("Fallback serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
