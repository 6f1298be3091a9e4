//! File fallback for batches that cannot reach the database.
//!
//! Each table gets an append-only `database_fallback_<table>.log` with one
//! line per entry:
//!
//! ```text
//! 2024-01-31 12:00:00,123 - FALLBACK_LOG: {"timestamp":"...","correlation_id":"..."}
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::{FALLBACK_MARKER, FALLBACK_TIMESTAMP_FORMAT};
use crate::error_handling::FallbackError;
use crate::storage::{LogEntry, TableKind};

/// Append-only fallback file for one table.
pub struct FallbackSink {
    path: PathBuf,
    file: Option<File>,
}

impl FallbackSink {
    pub fn new(dir: impl AsRef<Path>, kind: TableKind) -> Self {
        Self {
            path: dir.as_ref().join(kind.fallback_file_name()),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn file(&mut self) -> Result<&mut File, FallbackError> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            debug!("Opened fallback file {}", self.path.display());
            self.file = Some(file);
        }
        // Populated above
        self.file.as_mut().ok_or_else(|| {
            FallbackError::Io(std::io::Error::other("fallback file handle missing"))
        })
    }

    /// Appends every entry of `batch` as one line and returns how many were written.
    ///
    /// The batch is serialized up front so a serialization failure writes
    /// nothing. On I/O failure the handle is dropped and reopened next time.
    pub async fn write_batch<E: LogEntry>(&mut self, batch: &[E]) -> Result<usize, FallbackError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let stamp = Utc::now().format(FALLBACK_TIMESTAMP_FORMAT).to_string();
        let mut buf = String::new();
        for entry in batch {
            buf.push_str(&stamp);
            buf.push_str(FALLBACK_MARKER);
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let result = async {
            let file = self.file().await?;
            file.write_all(buf.as_bytes()).await?;
            file.flush().await?;
            Ok::<_, FallbackError>(())
        }
        .await;

        if let Err(e) = result {
            self.file = None;
            return Err(e);
        }
        Ok(batch.len())
    }
}

/// Parses a fallback file back into entries.
///
/// Lines that do not carry the fallback marker or fail to deserialize are
/// skipped with a warning so one corrupt line does not block a replay.
pub async fn read_fallback_file<E: LogEntry>(path: impl AsRef<Path>) -> Result<Vec<E>, FallbackError> {
    let path = path.as_ref();
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let Some((_, json)) = line.split_once(FALLBACK_MARKER) else {
            if !line.trim().is_empty() {
                warn!("{}:{line_no}: not a fallback line, skipping", path.display());
            }
            continue;
        };
        match serde_json::from_str::<E>(json) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("{}:{line_no}: unreadable entry ({e}), skipping", path.display()),
        }
    }

    Ok(entries)
}
