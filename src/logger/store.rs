//! Destinations for batches leaving the writer.
//!
//! [`LogStore`] is the seam between the batch writer and the database.
//! [`SqlLogStore`] is the production implementation; tests plug in stubs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};

use crate::config::{SQLITE_MAX_VARIABLES, WRITER_ACQUIRE_TIMEOUT};
use crate::error_handling::WriteError;
use crate::storage::{ConnectionPoolManager, LogEntry, PooledConnection};

/// Persists batches of one entry type.
#[async_trait]
pub trait LogStore<E: LogEntry>: Send {
    /// Writes `batch` atomically, preserving its order.
    async fn write_batch(&mut self, batch: &[E]) -> Result<(), WriteError>;

    /// Releases any held resources. Called once when the writer exits.
    async fn close(&mut self) {}
}

/// Writes batches through a dedicated connection from the pool.
///
/// The connection is acquired on the first write and kept across batches.
/// Any failure discards it, so the next batch starts from a fresh one.
pub struct SqlLogStore {
    pool: Arc<ConnectionPoolManager>,
    dedicated: Option<PooledConnection>,
    acquire_timeout: Duration,
}

impl SqlLogStore {
    pub fn new(pool: Arc<ConnectionPoolManager>) -> Self {
        Self {
            pool,
            dedicated: None,
            acquire_timeout: WRITER_ACQUIRE_TIMEOUT,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Whether a dedicated connection is currently held.
    pub fn holds_connection(&self) -> bool {
        self.dedicated.is_some()
    }

    async fn insert<E: LogEntry>(&mut self, batch: &[E]) -> Result<(), WriteError> {
        if self.dedicated.is_none() {
            let conn = self.pool.get_connection(self.acquire_timeout).await?;
            debug!("Acquired dedicated connection for {}", E::KIND);
            self.dedicated = Some(conn);
        }
        let Some(conn) = self.dedicated.as_mut() else {
            return Err(WriteError::Rejected("dedicated connection unavailable".into()));
        };

        let rows = rows_per_statement(E::KIND.columns().len());
        if batch.len() <= rows {
            insert_rows(&mut **conn, batch).await?;
            return Ok(());
        }

        // Too many parameters for one statement: split, but keep the batch atomic
        let mut tx = (&mut **conn).begin().await?;
        for chunk in batch.chunks(rows) {
            insert_rows(&mut *tx, chunk).await?;
        }
        tx.commit().await?;
        debug!(
            "Wrote {} entries to {} in {} statements",
            batch.len(),
            E::KIND,
            batch.len().div_ceil(rows)
        );
        Ok(())
    }
}

/// Rows that fit in one multi-row insert of `columns` columns.
fn rows_per_statement(columns: usize) -> usize {
    (SQLITE_MAX_VARIABLES / columns.max(1)).max(1)
}

async fn insert_rows<E: LogEntry>(
    conn: &mut SqliteConnection,
    rows: &[E],
) -> Result<(), sqlx::Error> {
    let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(E::KIND.insert_prefix());
    builder.push_values(rows, |mut row, entry| entry.bind_row(&mut row));
    builder.build().execute(conn).await?;
    Ok(())
}

#[async_trait]
impl<E: LogEntry> LogStore<E> for SqlLogStore {
    async fn write_batch(&mut self, batch: &[E]) -> Result<(), WriteError> {
        if batch.is_empty() {
            return Ok(());
        }
        let result = self.insert(batch).await;
        if result.is_err() {
            if let Some(conn) = self.dedicated.take() {
                warn!("Discarding dedicated connection for {} after write failure", E::KIND);
                self.pool.discard(conn).await;
            }
        }
        result
    }

    async fn close(&mut self) {
        if let Some(conn) = self.dedicated.take() {
            self.pool.return_connection(conn).await;
        }
    }
}
