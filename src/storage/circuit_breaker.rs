//! Circuit breaker for database write operations.
//!
//! Prevents hammering a failing database. After the failure threshold is
//! reached the circuit opens and writes are routed elsewhere until the
//! recovery timeout expires; the next write is then a trial whose outcome
//! closes or re-opens the circuit.
//!
//! ```text
//! CLOSED --(failures >= threshold)--> OPEN --(recovery timeout)--> HALF_OPEN
//! HALF_OPEN --(success)--> CLOSED
//! HALF_OPEN --(failure)--> OPEN
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BreakerConfig;

/// Gate state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Writes go to the database.
    Closed,
    /// Writes are diverted until the recovery timeout expires.
    Open,
    /// Recovery timeout expired; writes are trials.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a breaker's counters and state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    #[serde(rename = "last_failure")]
    pub last_failure_time: Option<DateTime<Utc>>,
    #[serde(rename = "last_success")]
    pub last_success_time: Option<DateTime<Utc>>,
}

struct BreakerState {
    stats: CircuitBreakerStats,
    // Monotonic twin of `last_failure_time`, used for the recovery check
    last_failure_at: Option<Instant>,
}

/// Three-state gate consulted before every database write.
///
/// All state lives behind one mutex. Nothing awaits while it is held, so the
/// breaker can be shared freely between the writer task and stats readers.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker.
    ///
    /// # Arguments
    ///
    /// * `failure_threshold` - Failures before the circuit opens
    /// * `recovery_timeout` - How long the circuit stays open before a trial
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        CircuitBreaker {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            state: Mutex::new(BreakerState {
                stats: CircuitBreakerStats {
                    state: CircuitState::Closed,
                    failure_count: 0,
                    success_count: 0,
                    last_failure_time: None,
                    last_success_time: None,
                },
                last_failure_at: None,
            }),
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.failure_threshold, config.recovery_timeout)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Counters stay meaningful even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a database write may be attempted now.
    ///
    /// In `OPEN`, returns `true` only once the recovery timeout has elapsed
    /// since the last failure, moving the circuit to `HALF_OPEN`.
    /// `HALF_OPEN` admits every caller; with one writer task per logger only
    /// one trial is ever in flight.
    pub fn can_execute(&self) -> bool {
        let mut guard = self.lock();
        match guard.stats.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = guard
                    .last_failure_at
                    .map_or(true, |at| at.elapsed() > self.recovery_timeout);
                if recovered {
                    guard.stats.state = CircuitState::HalfOpen;
                    log::info!(
                        "Database write circuit breaker: recovery timeout elapsed, circuit half-open"
                    );
                }
                recovered
            }
        }
    }

    /// Records a successful write.
    ///
    /// A success in `HALF_OPEN` closes the circuit and clears the failure count.
    pub fn record_success(&self) {
        let mut guard = self.lock();
        guard.stats.success_count += 1;
        guard.stats.last_success_time = Some(Utc::now());
        if guard.stats.state == CircuitState::HalfOpen {
            guard.stats.state = CircuitState::Closed;
            guard.stats.failure_count = 0;
            log::info!("Database write circuit breaker: circuit closed after successful write");
        }
    }

    /// Records a failed write, opening the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut guard = self.lock();
        guard.stats.failure_count = guard.stats.failure_count.saturating_add(1);
        guard.stats.last_failure_time = Some(Utc::now());
        guard.last_failure_at = Some(Instant::now());

        if guard.stats.failure_count >= self.failure_threshold {
            if guard.stats.state != CircuitState::Open {
                log::error!(
                    "Database write circuit breaker: circuit opened after {} failures (recovery: {}s)",
                    guard.stats.failure_count,
                    self.recovery_timeout.as_secs_f64()
                );
            }
            guard.stats.state = CircuitState::Open;
        }
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.lock().stats.state
    }

    /// Snapshot of counters and state.
    pub fn get_stats(&self) -> CircuitBreakerStats {
        self.lock().stats.clone()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_config(&BreakerConfig::default())
    }
}
