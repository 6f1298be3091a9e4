//! Queueing, batching and shutdown behaviour of a single logger.

mod helpers;

use std::time::Duration;

use tempfile::TempDir;
use telemetry_sink::{
    ErrorLogEntry, LogOutcome, LoggerConfig, OverflowPolicy, ResilientDatabaseLogger,
};

use helpers::{error_entry, fast_config, wait_until, ScriptedStore};

type ErrorLogger = ResilientDatabaseLogger<ErrorLogEntry>;

#[tokio::test(start_paused = true)]
async fn test_batches_split_by_size_then_interval() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let config = LoggerConfig {
        batch_size: 5,
        flush_interval: Duration::from_secs(10),
        ..fast_config(dir.path())
    };
    let logger = ErrorLogger::spawn(config, store.clone()).unwrap();

    for i in 0..12 {
        logger.log_async(error_entry(i));
    }
    // Two full batches go out at once; the remainder waits for the interval
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.batch_sizes(), vec![5, 5]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.batch_sizes(), vec![5, 5, 2]);

    let stats = logger.get_stats();
    assert_eq!(stats.logs_queued, 12);
    assert_eq!(stats.logs_written_to_db, 12);
    assert_eq!(stats.logs_dropped, 0);
    assert_eq!(stats.database_errors, 0);
    assert_eq!(stats.queue_size, 0);
    assert!(stats.last_flush.is_some());

    logger.close().await;
}

#[tokio::test]
async fn test_entries_keep_fifo_order() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let logger = ErrorLogger::spawn(fast_config(dir.path()), store.clone()).unwrap();

    for i in 0..23 {
        logger.log_async(error_entry(i));
    }
    logger.close().await;

    let expected: Vec<String> = (0..23).map(|i| format!("failure {i}")).collect();
    assert_eq!(store.written_messages(), expected);
}

#[tokio::test]
async fn test_full_queue_drops_newest() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let config = LoggerConfig {
        max_queue_size: 3,
        ..fast_config(dir.path())
    };
    let logger = ErrorLogger::spawn(config, store.clone()).unwrap();

    // The writer cannot run until this task yields, so the queue fills up
    let outcomes: Vec<LogOutcome> = (0..5).map(|i| logger.try_log(error_entry(i))).collect();
    assert_eq!(
        outcomes,
        vec![
            LogOutcome::Ok,
            LogOutcome::Ok,
            LogOutcome::Ok,
            LogOutcome::QueueFull,
            LogOutcome::QueueFull
        ]
    );
    assert_eq!(logger.queue_size(), 3);
    assert_eq!(logger.get_stats().logs_dropped, 2);

    logger.close().await;
    let stats = logger.get_stats();
    assert_eq!(stats.logs_queued, 3);
    assert_eq!(stats.logs_dropped, 2);
    assert_eq!(stats.logs_written_to_db, 3);
    assert_eq!(store.written_messages(), vec!["failure 0", "failure 1", "failure 2"]);
    assert_eq!(
        logger
            .recent_failures()
            .iter()
            .filter(|d| d.outcome == LogOutcome::QueueFull)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_full_queue_can_drop_oldest() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let config = LoggerConfig {
        max_queue_size: 3,
        overflow_policy: OverflowPolicy::DropOldest,
        ..fast_config(dir.path())
    };
    let logger = ErrorLogger::spawn(config, store.clone()).unwrap();

    for i in 0..5 {
        logger.log_async(error_entry(i));
    }
    logger.close().await;

    assert_eq!(store.written_messages(), vec!["failure 2", "failure 3", "failure 4"]);
    assert_eq!(logger.get_stats().logs_dropped, 2);
}

#[tokio::test]
async fn test_close_drains_queue_and_stops_writer() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let config = LoggerConfig {
        batch_size: 100,
        flush_interval: Duration::from_secs(60),
        ..fast_config(dir.path())
    };
    let logger = ErrorLogger::spawn(config, store.clone()).unwrap();

    for i in 0..40 {
        logger.log_async(error_entry(i));
    }
    assert!(logger.is_writer_alive());

    // Shutdown must not wait for the 60s interval
    tokio::time::timeout(Duration::from_secs(5), logger.close())
        .await
        .expect("close should finish promptly");

    let stats = logger.get_stats();
    assert_eq!(stats.logs_written_to_db, 40);
    assert_eq!(stats.queue_size, 0);
    assert!(!stats.thread_alive);
    assert!(store.log.lock().unwrap().closed);

    // Idempotent
    logger.close().await;
    assert_eq!(logger.get_stats().logs_written_to_db, 40);
    assert_eq!(logger.try_log(error_entry(99)), LogOutcome::ShutDown);
}

#[tokio::test]
async fn test_flush_twice_is_harmless() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::accepting();
    let logger = ErrorLogger::spawn(fast_config(dir.path()), store.clone()).unwrap();

    for i in 0..7 {
        logger.log_async(error_entry(i));
    }
    logger.flush().await;
    logger.flush().await;
    assert_eq!(logger.queue_size(), 0);

    assert!(wait_until(Duration::from_secs(2), || logger.get_stats().logs_written_to_db == 7).await);
    let stats = logger.get_stats();
    assert_eq!(stats.database_errors, 0);
    assert_eq!(stats.logs_dropped, 0);
    assert_eq!(stats.fallback_writes, 0);

    logger.close().await;
}

#[tokio::test]
async fn test_stats_serialize_to_json() {
    let dir = TempDir::new().unwrap();
    let logger = ErrorLogger::spawn(fast_config(dir.path()), ScriptedStore::accepting()).unwrap();
    logger.log_async(error_entry(0));
    logger.close().await;

    let json = serde_json::to_value(logger.get_stats()).unwrap();
    assert_eq!(json["table"], "error_logs");
    assert_eq!(json["logs_written_to_db"], 1);
    assert_eq!(json["thread_alive"], false);
    assert_eq!(json["circuit_breaker"]["state"], "CLOSED");
}
