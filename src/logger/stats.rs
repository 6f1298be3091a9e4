//! Logger statistics.
//!
//! Producer-side counters (`logs_queued`, queue drops) are atomics on the
//! queue. Everything else is owned by the writer task, which publishes an
//! immutable [`WriterSnapshot`] after every loop iteration; readers load the
//! latest snapshot and never contend with the writer's increments.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::CircuitBreakerStats;

/// Counters owned by the batch writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterSnapshot {
    pub logs_written_to_db: u64,
    pub database_errors: u64,
    pub fallback_written: u64,
    pub fallback_dropped: u64,
    /// Entries of the batch currently being written; 0 between batches
    pub in_flight: u64,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Statistics of one [`ResilientDatabaseLogger`](crate::ResilientDatabaseLogger).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggerStats {
    pub table: &'static str,
    pub logs_queued: u64,
    pub logs_written_to_db: u64,
    pub logs_dropped: u64,
    pub database_errors: u64,
    pub fallback_writes: u64,
    pub queue_size: usize,
    pub thread_alive: bool,
    pub last_flush: Option<DateTime<Utc>>,
    pub circuit_breaker: CircuitBreakerStats,
}
