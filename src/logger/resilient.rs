//! The resilient database logger.
//!
//! Composes the bounded queue, the batch writer task, the circuit breaker
//! and the fallback sink behind four calls: `log_async`, `flush`, `close`
//! and `get_stats`. None of them can fail or block the caller for long.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{LoggerConfig, FLUSH_POLL_INTERVAL, WRITER_ABORT_GRACE};
use crate::error_handling::InitializationError;
use crate::storage::{CircuitBreaker, ConnectionPoolManager, LogEntry};

use super::diagnostics::{Diagnostic, DiagnosticsRing, LogOutcome};
use super::queue::BoundedLogQueue;
use super::stats::{LoggerStats, WriterSnapshot};
use super::store::{LogStore, SqlLogStore};
use super::writer::{BatchWriter, WriterShared};

/// Non-blocking, batched, circuit-broken logger for one table.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use telemetry_sink::{
///     ConnectionPoolManager, ErrorLogEntry, LoggerConfig, PoolConfig, ResilientDatabaseLogger,
///     Severity, TableKind,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = Arc::new(ConnectionPoolManager::new(PoolConfig::new("sqlite:telemetry.db")).await?);
/// let logger = ResilientDatabaseLogger::<ErrorLogEntry>::with_pool(
///     LoggerConfig::for_table(TableKind::Error),
///     pool,
/// )?;
///
/// logger.log_async(ErrorLogEntry::new("Timeout", "quote fetch timed out", "collector", Severity::High));
/// logger.close().await;
/// # Ok(())
/// # }
/// ```
pub struct ResilientDatabaseLogger<E: LogEntry> {
    config: LoggerConfig,
    queue: Arc<BoundedLogQueue<E>>,
    breaker: Arc<CircuitBreaker>,
    published: Arc<ArcSwap<WriterSnapshot>>,
    diagnostics: Arc<DiagnosticsRing>,
    shutdown: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
    /// Entries lost with a writer aborted mid-batch
    abandoned: AtomicU64,
}

impl<E: LogEntry> ResilientDatabaseLogger<E> {
    /// Starts a logger writing through `store`.
    ///
    /// The writer task is spawned on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationError::RuntimeError`] when called outside a runtime.
    pub fn spawn<S>(config: LoggerConfig, store: S) -> Result<Self, InitializationError>
    where
        S: LogStore<E> + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| InitializationError::RuntimeError)?;

        let queue = Arc::new(BoundedLogQueue::new(
            config.max_queue_size,
            config.overflow_policy,
        ));
        let breaker = Arc::new(CircuitBreaker::from_config(&config.breaker));
        let published = Arc::new(ArcSwap::from_pointee(WriterSnapshot::default()));
        let diagnostics = Arc::new(DiagnosticsRing::new(config.diagnostics_capacity));
        let shutdown = CancellationToken::new();

        let writer = BatchWriter::new(
            WriterShared {
                queue: Arc::clone(&queue),
                breaker: Arc::clone(&breaker),
                published: Arc::clone(&published),
                diagnostics: Arc::clone(&diagnostics),
                shutdown: shutdown.clone(),
            },
            store,
            &config,
        );
        let handle = runtime.spawn(writer.run());

        Ok(Self {
            config,
            queue,
            breaker,
            published,
            diagnostics,
            shutdown,
            writer: Mutex::new(Some(handle)),
            abandoned: AtomicU64::new(0),
        })
    }

    /// Starts a logger writing to the database behind `pool`.
    pub fn with_pool(
        config: LoggerConfig,
        pool: Arc<ConnectionPoolManager>,
    ) -> Result<Self, InitializationError> {
        Self::spawn(config, SqlLogStore::new(pool))
    }

    /// Queues `entry` for writing. Never blocks, never fails.
    pub fn log_async(&self, entry: E) {
        let _ = self.try_log(entry);
    }

    /// Queues `entry` and reports what happened to it.
    ///
    /// Stamps the entry with the current time if it has no timestamp.
    pub fn try_log(&self, mut entry: E) -> LogOutcome {
        if entry.timestamp().is_none() {
            entry.set_timestamp(Utc::now());
        }
        let outcome = self.queue.push(entry);
        if !outcome.is_ok() {
            debug!("{} entry not queued: {outcome}", E::KIND);
            self.diagnostics.record(
                outcome,
                format!("{} queue ({} max)", E::KIND, self.queue.capacity()),
            );
        }
        outcome
    }

    /// Waits until the queue is empty or `flush_timeout` elapses.
    ///
    /// Entries that left the queue may still be in the writer's current
    /// batch; this does not wait for them to reach the database.
    pub async fn flush(&self) {
        let deadline = Instant::now() + self.config.flush_timeout;
        while !self.queue.is_empty() {
            if !self.is_writer_alive() {
                warn!(
                    "{} writer is not running, {} entries remain queued",
                    E::KIND,
                    self.queue.len()
                );
                return;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Flush of {} timed out with {} entries still queued",
                    E::KIND,
                    self.queue.len()
                );
                return;
            }
            tokio::time::sleep(FLUSH_POLL_INTERVAL).await;
        }
    }

    /// Stops accepting entries, drains the queue and stops the writer.
    ///
    /// The writer gets `shutdown_timeout` to finish; after that it is
    /// aborted so shutdown never hangs. Calling `close` again is a no-op.
    pub async fn close(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.queue.close();
        self.shutdown.cancel();
        self.flush().await;

        let handle = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            return;
        };

        match tokio::time::timeout(self.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{} writer ended abnormally: {e}", E::KIND),
            Err(_) => {
                warn!(
                    "{} writer did not stop within {:?}, aborting",
                    E::KIND,
                    self.config.shutdown_timeout
                );
                handle.abort();
                let _ = tokio::time::timeout(WRITER_ABORT_GRACE, &mut handle).await;

                let in_flight = self.published.load().in_flight;
                if in_flight > 0 {
                    self.abandoned.fetch_add(in_flight, Ordering::Relaxed);
                    warn!("{} writer aborted mid-batch, {in_flight} entries lost", E::KIND);
                    self.diagnostics.record(
                        LogOutcome::WriteFailed,
                        format!("writer aborted on close; {in_flight} in-flight entries dropped"),
                    );
                }
            }
        }

        let remaining = self.queue.len();
        if remaining > 0 {
            warn!("{} logger closed with {remaining} entries unwritten", E::KIND);
        }
        info!("{} logger closed", E::KIND);

        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Current counters, queue depth, writer liveness and breaker state.
    pub fn get_stats(&self) -> LoggerStats {
        let snapshot = self.published.load();
        LoggerStats {
            table: E::KIND.table_name(),
            logs_queued: self.queue.queued_count(),
            logs_written_to_db: snapshot.logs_written_to_db,
            logs_dropped: self.queue.dropped_count()
                + snapshot.fallback_dropped
                + self.abandoned.load(Ordering::Relaxed),
            database_errors: snapshot.database_errors,
            fallback_writes: snapshot.fallback_written,
            queue_size: self.queue.len(),
            thread_alive: self.is_writer_alive(),
            last_flush: snapshot.last_flush,
            circuit_breaker: self.breaker.get_stats(),
        }
    }

    /// Recent failures, oldest first.
    pub fn recent_failures(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Whether the writer task is still running.
    pub fn is_writer_alive(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
}

impl<E: LogEntry> Drop for ResilientDatabaseLogger<E> {
    fn drop(&mut self) {
        // Let the writer drain what is queued and exit on its own
        self.queue.close();
        self.shutdown.cancel();
    }
}
