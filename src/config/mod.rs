//! Configuration and constants.
//!
//! This module provides:
//! - Default values for queueing, batching, pooling and circuit breaking
//! - Config structs for loggers, the circuit breaker and the connection pool

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{
    BreakerConfig, ContextSettings, LogFormat, LogLevel, LoggerConfig, OverflowPolicy, PoolConfig,
};
