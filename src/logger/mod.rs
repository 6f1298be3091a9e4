//! Resilient asynchronous logging.
//!
//! Producer code calls [`ResilientDatabaseLogger::log_async`], which only
//! enqueues. A background writer task turns the queue into batches and
//! writes them to the database, or to a local fallback file while the
//! circuit breaker is open or the database rejects a write.

mod diagnostics;
mod fallback;
mod queue;
mod replay;
mod resilient;
mod stats;
mod store;
mod writer;

// Re-export public API
pub use diagnostics::{Diagnostic, DiagnosticsRing, LogOutcome};
pub use fallback::{read_fallback_file, FallbackSink};
pub use queue::BoundedLogQueue;
pub use replay::{replay_fallback_file, replay_table};
pub use resilient::ResilientDatabaseLogger;
pub use stats::{LoggerStats, WriterSnapshot};
pub use store::{LogStore, SqlLogStore};
