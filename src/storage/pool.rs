//! Database connection pool management.
//!
//! [`ConnectionPoolManager`] owns the process-wide SQLite pool:
//! - Checkout retries with exponential backoff when the pool is exhausted
//! - Permanent fallback to one-off direct connections if the pool could not
//!   be built at start-up
//! - Scoped acquisition that always hands the connection back

use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection, SqliteConnection, SqlitePool};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::PoolConfig;
use crate::error_handling::PoolError;

/// A checked-out connection.
///
/// Derefs to [`SqliteConnection`] so it can be passed straight to
/// `execute(&mut *conn)`.
pub enum PooledConnection {
    /// Borrowed from the pool; dropping it returns it.
    Pooled(sqlx::pool::PoolConnection<sqlx::Sqlite>),
    /// Opened directly because the pool is unavailable; dropping it closes it.
    Direct(SqliteConnection),
}

impl PooledConnection {
    /// Whether this connection bypasses the pool.
    pub fn is_direct(&self) -> bool {
        matches!(self, PooledConnection::Direct(_))
    }
}

impl Deref for PooledConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            PooledConnection::Pooled(conn) => conn,
            PooledConnection::Direct(conn) => conn,
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            PooledConnection::Pooled(conn) => conn,
            PooledConnection::Direct(conn) => conn,
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PoolStatus {
    /// True when every checkout opens a direct connection.
    pub fallback_mode: bool,
    /// Open pooled connections (idle and checked out).
    pub size: u32,
    /// Idle pooled connections.
    pub idle: usize,
}

/// Bounded pool of database connections shared by every logger in the process.
pub struct ConnectionPoolManager {
    pool: Option<SqlitePool>,
    connect_options: SqliteConnectOptions,
    config: PoolConfig,
}

impl ConnectionPoolManager {
    /// Builds the pool described by `config`.
    ///
    /// Only an unparsable URL is an error. If the pool itself cannot be
    /// established the manager still comes up, in fallback mode, and every
    /// later checkout opens a direct connection instead.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|source| PoolError::InvalidUrl {
                url: config.database_url.clone(),
                source,
            })?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.connect_timeout);

        let pool = match SqlitePoolOptions::new()
            .min_connections(config.min_conn)
            .max_connections(config.max_conn.max(1))
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => {
                info!(
                    "Connection pool ready for {} ({}..{} connections)",
                    config.database_url, config.min_conn, config.max_conn
                );
                Some(pool)
            }
            Err(e) => {
                warn!(
                    "Connection pool initialization failed for {}: {e}. Falling back to direct connections",
                    config.database_url
                );
                None
            }
        };

        Ok(Self {
            pool,
            connect_options,
            config,
        })
    }

    /// Whether pool initialization failed and direct connections are used.
    pub fn is_fallback_mode(&self) -> bool {
        self.pool.is_none()
    }

    /// Pool configuration this manager was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Current pool occupancy.
    pub fn status(&self) -> PoolStatus {
        match &self.pool {
            Some(pool) => PoolStatus {
                fallback_mode: false,
                size: pool.size(),
                idle: pool.num_idle(),
            },
            None => PoolStatus {
                fallback_mode: true,
                size: 0,
                idle: 0,
            },
        }
    }

    /// Acquires a connection, waiting at most `timeout` per checkout attempt.
    ///
    /// An exhausted pool is retried on an exponential schedule with jitter, for
    /// `acquire_attempts` checkouts in total, before [`PoolError::Exhausted`]
    /// is returned. Other failures are returned at once. In fallback mode a
    /// direct connection is opened within `timeout` (capped by
    /// `connect_timeout`).
    pub async fn get_connection(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        let Some(pool) = &self.pool else {
            return self.connect_direct(timeout.min(self.config.connect_timeout)).await;
        };

        let attempts = self.config.acquire_attempts.max(1);
        let strategy = retry_schedule(&self.config).map(jitter);
        let mut attempt = 0u32;

        let result = RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                let current = attempt;
                async move {
                    match tokio::time::timeout(timeout, pool.acquire()).await {
                        Ok(Ok(conn)) => Ok(PooledConnection::Pooled(conn)),
                        Ok(Err(sqlx::Error::PoolClosed)) => Err(PoolError::Closed),
                        Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => {
                            debug!("Connection pool exhausted (attempt {current}/{attempts})");
                            Err(PoolError::Exhausted { attempts: current })
                        }
                        Ok(Err(e)) => Err(PoolError::Connect(e)),
                    }
                }
            },
            |e: &PoolError| e.is_exhaustion(),
        )
        .await;

        if let Err(PoolError::Exhausted { attempts }) = &result {
            warn!("Connection pool exhausted after {attempts} attempts");
        }
        result
    }

    /// Hands a connection back.
    ///
    /// Pooled connections return to the pool. Direct connections are closed;
    /// a failure to close is logged and otherwise ignored.
    pub async fn return_connection(&self, conn: PooledConnection) {
        match conn {
            PooledConnection::Pooled(conn) => drop(conn),
            PooledConnection::Direct(conn) => {
                if let Err(e) = conn.close().await {
                    debug!("Error closing direct connection: {e}");
                }
            }
        }
    }

    /// Closes a connection that errored instead of returning it for reuse.
    ///
    /// The pool opens a replacement on demand.
    pub async fn discard(&self, conn: PooledConnection) {
        let result = match conn {
            PooledConnection::Pooled(conn) => conn.close().await,
            PooledConnection::Direct(conn) => conn.close().await,
        };
        if let Err(e) = result {
            debug!("Error closing discarded connection: {e}");
        }
    }

    /// Runs `f` with a checked-out connection and returns it afterwards.
    ///
    /// The connection is handed back whether `f` succeeds or fails. If `f`
    /// panics, dropping the [`PooledConnection`] during unwinding returns a
    /// pooled connection to the pool or closes a direct one.
    ///
    /// ```no_run
    /// # async fn example(pool: &telemetry_sink::ConnectionPoolManager) -> Result<(), telemetry_sink::DatabaseError> {
    /// use std::time::Duration;
    ///
    /// let count: i64 = pool
    ///     .with_connection(Duration::from_secs(5), |conn| {
    ///         Box::pin(async move {
    ///             sqlx::query_scalar("SELECT COUNT(*) FROM error_logs")
    ///                 .fetch_one(conn)
    ///                 .await
    ///         })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_connection<T, F>(
        &self,
        timeout: Duration,
        f: F,
    ) -> Result<T, crate::error_handling::DatabaseError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        let mut conn = self.get_connection(timeout).await?;
        let result = f(&mut *conn).await;
        self.return_connection(conn).await;
        Ok(result?)
    }

    /// Closes the pool. Checked-out connections are closed as they return.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    async fn connect_direct(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        match tokio::time::timeout(timeout, self.connect_options.connect()).await {
            Ok(Ok(conn)) => Ok(PooledConnection::Direct(conn)),
            Ok(Err(e)) => Err(PoolError::Connect(e)),
            Err(_) => Err(PoolError::Timeout(timeout)),
        }
    }
}

/// Delays between checkout attempts, before jitter.
///
/// Starts at `backoff_base` and doubles up to `backoff_max`; yields
/// `acquire_attempts - 1` delays, one per retry.
fn retry_schedule(config: &PoolConfig) -> impl Iterator<Item = Duration> {
    // from_millis(2) doubles on every step; the factor scales the first
    // delay to backoff_base
    let half_base = (config.backoff_base.as_millis() as u64 / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(half_base)
        .max_delay(config.backoff_max)
        .take(config.acquire_attempts.max(1) as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, name: &str) -> PoolConfig {
        PoolConfig {
            min_conn: 1,
            max_conn: 2,
            connect_timeout: Duration::from_secs(2),
            acquire_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(40),
            ..PoolConfig::new(format!("sqlite:{}", dir.path().join(name).display()))
        }
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let result = ConnectionPoolManager::new(PoolConfig::new("sqlite:test.db?bogus=1")).await;
        assert!(matches!(result, Err(PoolError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_pooled_checkout_and_return() {
        let dir = TempDir::new().expect("tempdir");
        let manager = ConnectionPoolManager::new(PoolConfig {
            max_conn: 1,
            acquire_attempts: 1,
            ..config_for(&dir, "pool.db")
        })
        .await
        .expect("manager");
        assert!(!manager.is_fallback_mode());

        let mut conn = manager
            .get_connection(Duration::from_secs(1))
            .await
            .expect("checkout");
        assert!(!conn.is_direct());
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut *conn)
            .await
            .expect("query");
        assert_eq!(one, 1);

        manager.return_connection(conn).await;
        // With a single connection, a second checkout only succeeds once
        // the first is back in the pool
        let again = manager
            .get_connection(Duration::from_millis(500))
            .await
            .expect("checkout after return");
        assert!(!again.is_direct());
        assert_eq!(manager.status().size, 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_retries_then_fails() {
        let dir = TempDir::new().expect("tempdir");
        let manager = ConnectionPoolManager::new(config_for(&dir, "exhaust.db"))
            .await
            .expect("manager");

        let a = manager.get_connection(Duration::from_secs(1)).await.expect("a");
        let b = manager.get_connection(Duration::from_secs(1)).await.expect("b");

        let started = std::time::Instant::now();
        let err = match manager.get_connection(Duration::from_millis(50)).await {
            Ok(_) => panic!("pool should be exhausted"),
            Err(e) => e,
        };
        assert!(err.is_exhaustion());
        // Three 50ms waits plus two backoff sleeps
        assert!(started.elapsed() >= Duration::from_millis(150));

        manager.return_connection(a).await;
        let c = manager.get_connection(Duration::from_secs(1)).await;
        assert!(c.is_ok(), "returned connection should be reusable");
        drop(b);
    }

    #[tokio::test]
    async fn test_fallback_mode_uses_direct_connections() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("late.db");
        let config = PoolConfig {
            create_if_missing: false,
            ..config_for(&dir, "late.db")
        };

        let manager = ConnectionPoolManager::new(config).await.expect("manager");
        assert!(manager.is_fallback_mode());
        assert!(manager.status().fallback_mode);

        // Nothing to connect to yet
        let err = manager.get_connection(Duration::from_secs(1)).await;
        assert!(matches!(err, Err(PoolError::Connect(_))));

        std::fs::File::create(&path).expect("create db file");
        let conn = manager
            .get_connection(Duration::from_secs(1))
            .await
            .expect("direct connection");
        assert!(conn.is_direct());
        manager.return_connection(conn).await;
    }

    #[tokio::test]
    async fn test_fallback_mode_honours_caller_timeout() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("late.db");
        let config = PoolConfig {
            create_if_missing: false,
            connect_timeout: Duration::from_secs(30),
            ..config_for(&dir, "late.db")
        };
        let manager = ConnectionPoolManager::new(config).await.expect("manager");
        assert!(manager.is_fallback_mode());
        std::fs::File::create(&path).expect("create db file");

        // The caller's budget wins over the longer connect_timeout
        let err = manager.get_connection(Duration::ZERO).await;
        assert!(matches!(err, Err(PoolError::Timeout(t)) if t == Duration::ZERO));

        let conn = manager
            .get_connection(Duration::from_secs(2))
            .await
            .expect("direct connection");
        assert!(conn.is_direct());
        manager.return_connection(conn).await;
    }

    #[tokio::test]
    async fn test_with_connection_returns_on_error() {
        let dir = TempDir::new().expect("tempdir");
        let manager = ConnectionPoolManager::new(PoolConfig {
            max_conn: 1,
            ..config_for(&dir, "scoped.db")
        })
        .await
        .expect("manager");

        let failed: Result<i64, _> = manager
            .with_connection(Duration::from_secs(1), |conn| {
                Box::pin(async move {
                    sqlx::query_scalar("SELECT * FROM missing_table")
                        .fetch_one(conn)
                        .await
                })
            })
            .await;
        assert!(failed.is_err());

        // The single connection must be back in the pool
        let ok: i64 = manager
            .with_connection(Duration::from_millis(200), |conn| {
                Box::pin(async move { sqlx::query_scalar("SELECT 2").fetch_one(conn).await })
            })
            .await
            .expect("second checkout");
        assert_eq!(ok, 2);
    }

    #[test]
    fn test_retry_schedule_doubles_up_to_cap() {
        let config = PoolConfig {
            acquire_attempts: 6,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(300),
            ..PoolConfig::default()
        };
        let delays: Vec<u64> = retry_schedule(&config)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 300, 300, 300]);

        let single = PoolConfig {
            acquire_attempts: 1,
            ..config
        };
        assert_eq!(retry_schedule(&single).count(), 0);
    }
}
