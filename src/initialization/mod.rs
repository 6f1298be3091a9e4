//! Process-level setup for binaries embedding the sink.

mod logger;

// Re-export public API
pub use logger::init_logger_with;
