//! Background batch writer.
//!
//! One writer task per logger drains the queue into batches and sends each
//! batch to the database when the circuit breaker allows it, or to the
//! fallback file otherwise. A batch is never retried: it is persisted,
//! diverted, or counted as dropped, and the loop moves on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::LoggerConfig;
use crate::storage::{CircuitBreaker, LogEntry};

use super::diagnostics::{DiagnosticsRing, LogOutcome};
use super::fallback::FallbackSink;
use super::queue::BoundedLogQueue;
use super::stats::WriterSnapshot;
use super::store::LogStore;

/// State shared between a logger facade and its writer task.
pub(crate) struct WriterShared<E> {
    pub queue: Arc<BoundedLogQueue<E>>,
    pub breaker: Arc<CircuitBreaker>,
    pub published: Arc<ArcSwap<WriterSnapshot>>,
    pub diagnostics: Arc<DiagnosticsRing>,
    pub shutdown: CancellationToken,
}

/// Drains one logger's queue until shutdown.
pub(crate) struct BatchWriter<E: LogEntry, S: LogStore<E>> {
    shared: WriterShared<E>,
    store: S,
    fallback: FallbackSink,
    batch_size: usize,
    flush_interval: Duration,
    error_backoff: Duration,
    counters: WriterSnapshot,
    last_flush: Instant,
}

impl<E: LogEntry, S: LogStore<E>> BatchWriter<E, S> {
    pub fn new(shared: WriterShared<E>, store: S, config: &LoggerConfig) -> Self {
        Self {
            shared,
            store,
            fallback: FallbackSink::new(&config.fallback_dir, E::KIND),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            error_backoff: config.error_backoff,
            counters: WriterSnapshot::default(),
            last_flush: Instant::now(),
        }
    }

    /// Runs until shutdown is signalled and the queue is drained.
    pub async fn run(mut self) {
        info!("Batch writer for {} started", E::KIND);

        loop {
            let batch = self.collect_batch().await;

            if !batch.is_empty() {
                let size = batch.len();
                // Published first so a logger that aborts this task can count the batch
                self.counters.in_flight = size as u64;
                self.publish();
                let outcome = AssertUnwindSafe(self.process_batch(batch))
                    .catch_unwind()
                    .await;
                self.counters.in_flight = 0;
                if outcome.is_err() {
                    // The batch went down with the panic; do not retry it
                    self.counters.database_errors += 1;
                    error!(
                        "Batch writer for {} panicked, discarding batch of {size} entries",
                        E::KIND
                    );
                    self.shared.diagnostics.record(
                        LogOutcome::WriteFailed,
                        format!("writer loop panicked; {size} entries discarded"),
                    );
                    self.publish();
                    tokio::select! {
                        _ = tokio::time::sleep(self.error_backoff) => {}
                        _ = self.shared.shutdown.cancelled() => {}
                    }
                }
            }

            self.last_flush = Instant::now();
            self.counters.last_flush = Some(Utc::now());
            self.publish();

            if self.shared.shutdown.is_cancelled() && self.shared.queue.is_empty() {
                break;
            }
        }

        self.store.close().await;
        self.publish();
        info!(
            "Batch writer for {} stopped ({} written, {} to fallback)",
            E::KIND,
            self.counters.logs_written_to_db,
            self.counters.fallback_written
        );
    }

    /// Gathers up to `batch_size` entries, waiting no later than
    /// `flush_interval` after the previous flush. Once shutdown is signalled
    /// it only takes what is already queued.
    async fn collect_batch(&mut self) -> Vec<E> {
        let deadline = self.last_flush + self.flush_interval;
        let mut batch = Vec::with_capacity(self.batch_size);
        let queue = &self.shared.queue;
        let shutdown = &self.shared.shutdown;

        while batch.len() < self.batch_size {
            if let Some(entry) = queue.try_pop() {
                batch.push(entry);
                continue;
            }
            if shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = queue.wait_for_entry() => {}
                _ = tokio::time::sleep_until(deadline) => break,
                _ = shutdown.cancelled() => {}
            }
        }

        batch
    }

    async fn process_batch(&mut self, batch: Vec<E>) {
        let size = batch.len() as u64;

        if !self.shared.breaker.can_execute() {
            debug!(
                "Circuit open for {}, routing {size} entries to fallback",
                E::KIND
            );
            self.write_fallback(&batch).await;
            return;
        }

        match self.store.write_batch(&batch).await {
            Ok(()) => {
                self.shared.breaker.record_success();
                self.counters.logs_written_to_db += size;
                debug!("Wrote batch of {size} entries to {}", E::KIND);
            }
            Err(e) => {
                self.shared.breaker.record_failure();
                self.counters.database_errors += 1;
                warn!(
                    "Writing {size} entries to {} failed, routing to fallback: {e}",
                    E::KIND
                );
                self.shared
                    .diagnostics
                    .record(LogOutcome::WriteFailed, e.to_string());
                self.write_fallback(&batch).await;
            }
        }
    }

    async fn write_fallback(&mut self, batch: &[E]) {
        match self.fallback.write_batch(batch).await {
            Ok(written) => self.counters.fallback_written += written as u64,
            Err(e) => {
                self.counters.fallback_dropped += batch.len() as u64;
                error!(
                    "Fallback write to {} failed, {} entries lost: {e}",
                    self.fallback.path().display(),
                    batch.len()
                );
                self.shared
                    .diagnostics
                    .record(LogOutcome::FallbackFailed, e.to_string());
            }
        }
    }

    fn publish(&self) {
        self.shared
            .published
            .store(Arc::new(self.counters.clone()));
    }
}
