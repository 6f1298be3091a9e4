//! Configuration constants.
//!
//! Defaults for queueing, batching, circuit breaking and connection pooling.
//! Every value here can be overridden through the config structs in
//! [`crate::config::types`].

use std::time::Duration;

// Queue and batching
/// Default capacity of a logger's bounded queue
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
/// Default number of entries written per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Default time between flushes when the batch never fills up
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// How long `flush()` polls for the queue to drain before giving up
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `close()` waits for the writer task before aborting it
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// How long `close()` waits for an aborted writer to finish unwinding
pub const WRITER_ABORT_GRACE: Duration = Duration::from_secs(1);
/// Pause after an unexpected writer loop failure
pub const WRITER_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Interval at which `flush()` re-checks the queue length
pub const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Number of recent failures kept for diagnostics
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 64;

// Circuit breaker
/// Failures before the circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Time the circuit stays open before allowing a trial write
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

// Connection pool
/// Default database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:telemetry.db";
/// Connections opened eagerly when the pool starts
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
/// Upper bound on pooled connections
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Timeout for establishing a single connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Checkout attempts before reporting the pool as exhausted
pub const DEFAULT_ACQUIRE_ATTEMPTS: u32 = 3;
/// First backoff delay after an exhausted checkout; doubles on each attempt
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Cap on the backoff delay between checkout attempts
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(2);
/// Bound parameters SQLite accepts in one statement
pub const SQLITE_MAX_VARIABLES: usize = 32_766;
/// Timeout used by the batch writer when acquiring its dedicated connection
pub const WRITER_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// Fallback sink
/// Directory holding the per-table fallback files
pub const DEFAULT_FALLBACK_DIR: &str = "logs";
/// Marker separating the timestamp from the JSON payload in a fallback line
pub const FALLBACK_MARKER: &str = " - FALLBACK_LOG: ";
/// Timestamp layout of a fallback line (`2024-01-31 12:00:00,123`)
pub const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// `logger_name` recorded by the system logger unless configured otherwise
pub const DEFAULT_SYSTEM_LOGGER_NAME: &str = "telemetry_sink";

/// Batch size used when replaying a fallback file into the database
pub const REPLAY_BATCH_SIZE: usize = 500;
