// storage/mod.rs
// Database access: connection pool, circuit breaker, tables and entry types

pub mod circuit_breaker;
pub mod models;
pub mod pool;
pub mod schema;
pub mod table;

// Re-export commonly used items
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use models::{
    new_correlation_id, CollectionStatus, DataCollectionLogEntry, ErrorLogEntry,
    PerformanceLogEntry, Severity, SystemLogEntry,
};
pub use pool::{ConnectionPoolManager, PoolStatus, PooledConnection};
pub use schema::create_log_tables;
pub use table::{LogEntry, TableKind};
