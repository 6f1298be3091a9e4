//! Replaying fallback files into the database.
//!
//! Fallback files keep entries that never reached their table. Once the
//! database is healthy again they can be written back in batches. The file
//! is left untouched; replaying it twice writes its entries twice.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::error_handling::DatabaseError;
use crate::storage::{
    ConnectionPoolManager, DataCollectionLogEntry, ErrorLogEntry, LogEntry, PerformanceLogEntry,
    SystemLogEntry, TableKind,
};

use super::fallback::read_fallback_file;
use super::store::{LogStore, SqlLogStore};

/// Writes every readable entry of `path` to its table.
///
/// Returns the number of entries written. Stops at the first failed batch;
/// batches written before it stay written.
pub async fn replay_fallback_file<E: LogEntry>(
    pool: Arc<ConnectionPoolManager>,
    path: impl AsRef<Path>,
    batch_size: usize,
) -> Result<usize, DatabaseError> {
    let path = path.as_ref();
    let entries: Vec<E> = read_fallback_file(path).await?;
    if entries.is_empty() {
        info!("Nothing to replay from {}", path.display());
        return Ok(0);
    }

    let mut store = SqlLogStore::new(pool);
    let mut written = 0;
    for chunk in entries.chunks(batch_size.max(1)) {
        if let Err(e) = LogStore::<E>::write_batch(&mut store, chunk).await {
            LogStore::<E>::close(&mut store).await;
            return Err(e.into());
        }
        written += chunk.len();
        debug!("Replayed {written}/{} entries into {}", entries.len(), E::KIND);
    }
    LogStore::<E>::close(&mut store).await;

    info!(
        "Replayed {written} entries from {} into {}",
        path.display(),
        E::KIND
    );
    Ok(written)
}

/// Replays the fallback file of `kind` found in `fallback_dir`.
pub async fn replay_table(
    pool: Arc<ConnectionPoolManager>,
    kind: TableKind,
    fallback_dir: impl AsRef<Path>,
    batch_size: usize,
) -> Result<usize, DatabaseError> {
    let path = fallback_dir.as_ref().join(kind.fallback_file_name());
    match kind {
        TableKind::System => replay_fallback_file::<SystemLogEntry>(pool, path, batch_size).await,
        TableKind::Error => replay_fallback_file::<ErrorLogEntry>(pool, path, batch_size).await,
        TableKind::Performance => {
            replay_fallback_file::<PerformanceLogEntry>(pool, path, batch_size).await
        }
        TableKind::DataCollection => {
            replay_fallback_file::<DataCollectionLogEntry>(pool, path, batch_size).await
        }
    }
}
