//! Error handling.
//!
//! This module provides the error types for each failure domain of the
//! logging subsystem:
//! - **PoolError**: connection acquisition (exhaustion, connect failures)
//! - **WriteError**: a batch could not be persisted to the database
//! - **FallbackError**: a batch could not even be appended to the fallback file
//! - **DatabaseError**: schema setup and replay outside the batch writer
//! - **InitializationError**: process start-up

mod types;

// Re-export public API
pub use types::{DatabaseError, FallbackError, InitializationError, PoolError, WriteError};
