//! Outcome of logging operations and a ring buffer of recent failures.
//!
//! Public logging calls swallow every failure. The outcomes are still
//! recorded here so that operators can see why telemetry went missing.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of handing an entry (or a batch) to the logging subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    /// Accepted or persisted.
    Ok,
    /// The queue was full and an entry was shed.
    QueueFull,
    /// The logger was closed; the entry was rejected.
    ShutDown,
    /// The database write failed; the batch went to the fallback file.
    WriteFailed,
    /// The fallback file could not be written either; entries were lost.
    FallbackFailed,
}

impl LogOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, LogOutcome::Ok)
    }
}

impl fmt::Display for LogOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogOutcome::Ok => "ok",
            LogOutcome::QueueFull => "queue full",
            LogOutcome::ShutDown => "logger shut down",
            LogOutcome::WriteFailed => "database write failed",
            LogOutcome::FallbackFailed => "fallback write failed",
        };
        f.write_str(s)
    }
}

/// One recorded failure.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub outcome: LogOutcome,
    pub detail: String,
}

/// Keeps the most recent non-`Ok` outcomes, oldest evicted first.
pub struct DiagnosticsRing {
    capacity: usize,
    entries: Mutex<VecDeque<Diagnostic>>,
}

impl DiagnosticsRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records `outcome`; `Ok` outcomes are ignored.
    pub fn record(&self, outcome: LogOutcome, detail: impl Into<String>) {
        if outcome.is_ok() || self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Diagnostic {
            at: Utc::now(),
            outcome,
            detail: detail.into(),
        });
    }

    /// Recorded failures, oldest first.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
