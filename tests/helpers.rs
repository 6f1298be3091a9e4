// Shared test helpers: scripted stores, entry builders and polling.
//
// Included by the integration test files with `mod helpers;`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use telemetry_sink::{ErrorLogEntry, LogStore, LoggerConfig, Severity, WriteError};

/// What a [`ScriptedStore`] does with one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    Reject,
    Panic,
    /// Never completes
    Hang,
}

#[derive(Debug, Default)]
pub struct StoreLog {
    pub batch_sizes: Vec<usize>,
    pub written: Vec<ErrorLogEntry>,
    pub closed: bool,
}

/// A store that follows a script, then keeps repeating `then`.
#[derive(Clone)]
pub struct ScriptedStore {
    script: Arc<Mutex<VecDeque<Step>>>,
    then: Step,
    pub log: Arc<Mutex<StoreLog>>,
}

impl ScriptedStore {
    pub fn accepting() -> Self {
        Self::scripted(&[], Step::Accept)
    }

    pub fn rejecting() -> Self {
        Self::scripted(&[], Step::Reject)
    }

    pub fn scripted(steps: &[Step], then: Step) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.iter().copied().collect())),
            then,
            log: Arc::new(Mutex::new(StoreLog::default())),
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.log.lock().unwrap().batch_sizes.clone()
    }

    pub fn written_messages(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .written
            .iter()
            .map(|e| e.error_message.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().batch_sizes.len()
    }
}

#[async_trait]
impl LogStore<ErrorLogEntry> for ScriptedStore {
    async fn write_batch(&mut self, batch: &[ErrorLogEntry]) -> Result<(), WriteError> {
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.then);
        self.log.lock().unwrap().batch_sizes.push(batch.len());
        match step {
            Step::Accept => {
                self.log.lock().unwrap().written.extend_from_slice(batch);
                Ok(())
            }
            Step::Reject => Err(WriteError::Rejected("database is down".into())),
            Step::Panic => panic!("store blew up mid-write"),
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}

pub fn error_entry(i: usize) -> ErrorLogEntry {
    ErrorLogEntry::new("TestError", format!("failure {i}"), "tests", Severity::Low)
}

pub fn stamped_entry(i: usize) -> ErrorLogEntry {
    let mut entry = error_entry(i);
    entry.timestamp = Some(Utc::now());
    entry
}

/// Small batches and short timeouts, fallback files under `dir`.
pub fn fast_config(dir: &Path) -> LoggerConfig {
    LoggerConfig {
        batch_size: 5,
        flush_interval: Duration::from_millis(50),
        fallback_dir: dir.to_path_buf(),
        flush_timeout: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(5),
        error_backoff: Duration::from_millis(10),
        ..LoggerConfig::default()
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn count_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|content| content.lines().count())
        .unwrap_or(0)
}
