//! Telemetry table definitions.
//!
//! Production schemas are owned elsewhere; these `CREATE TABLE IF NOT EXISTS`
//! statements give the CLI and tests a compatible database to write into.

use std::time::Duration;

use log::info;
use sqlx::Connection;
use strum::IntoEnumIterator;

use crate::error_handling::DatabaseError;

use super::pool::ConnectionPoolManager;
use super::table::TableKind;

fn create_statement(kind: TableKind) -> &'static str {
    match kind {
        TableKind::System => {
            "CREATE TABLE IF NOT EXISTS system_logs (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                level TEXT NOT NULL,
                logger_name TEXT NOT NULL,
                message TEXT NOT NULL,
                module TEXT,
                metadata TEXT
            )"
        }
        TableKind::Error => {
            "CREATE TABLE IF NOT EXISTS error_logs (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                error_type TEXT NOT NULL,
                error_message TEXT NOT NULL,
                component TEXT NOT NULL,
                severity TEXT NOT NULL,
                stack_trace TEXT,
                metadata TEXT
            )"
        }
        TableKind::Performance => {
            "CREATE TABLE IF NOT EXISTS performance_logs (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                component TEXT NOT NULL,
                duration_ms REAL NOT NULL,
                success INTEGER NOT NULL,
                records_processed INTEGER,
                metadata TEXT
            )"
        }
        TableKind::DataCollection => {
            "CREATE TABLE IF NOT EXISTS data_collection_logs (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                source TEXT NOT NULL,
                operation TEXT NOT NULL,
                status TEXT NOT NULL,
                records_collected INTEGER NOT NULL,
                duration_ms REAL,
                error_message TEXT,
                metadata TEXT
            )"
        }
    }
}

/// Creates all four telemetry tables if they do not exist yet.
pub async fn create_log_tables(
    pool: &ConnectionPoolManager,
    timeout: Duration,
) -> Result<(), DatabaseError> {
    pool.with_connection(timeout, |conn| {
        Box::pin(async move {
            let mut tx = conn.begin().await?;
            for kind in TableKind::iter() {
                sqlx::query(create_statement(kind)).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    })
    .await?;

    info!("Telemetry tables ready");
    Ok(())
}
