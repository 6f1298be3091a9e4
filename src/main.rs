//! Command-line entry point.
//!
//! A thin wrapper around the `telemetry_sink` library for operating on a
//! telemetry database: creating its tables, replaying fallback files after an
//! outage, and emitting synthetic telemetry to exercise a deployment.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use telemetry_sink::config::{DEFAULT_DATABASE_URL, DEFAULT_FALLBACK_DIR, REPLAY_BATCH_SIZE};
use telemetry_sink::initialization::init_logger_with;
use telemetry_sink::specialized::ErrorEvent;
use telemetry_sink::{
    create_log_tables, replay_table, ConnectionPoolManager, ContextSettings, LogFormat, LogLevel,
    LoggingContext, PoolConfig, Severity, TableKind,
};

const SCHEMA_TIMEOUT: Duration = Duration::from_secs(10);

/// Operate on a telemetry database.
#[derive(Debug, Parser)]
#[command(name = "telemetry_sink", version, about)]
struct Cli {
    /// Log level for the sink's own diagnostics
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Log format: plain or json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the log tables if they do not exist
    InitSchema {
        #[arg(long, default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
    /// Write the entries of a fallback file back into their table
    Replay {
        #[arg(long, default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Table to replay (`error_logs`, `performance`, ...)
        #[arg(long)]
        table: TableKind,

        #[arg(long, value_parser, default_value = DEFAULT_FALLBACK_DIR)]
        fallback_dir: PathBuf,
    },
    /// Log synthetic telemetry and print the resulting statistics as JSON
    Emit {
        #[arg(long, default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Number of synthetic collection runs
        #[arg(long, default_value_t = 100)]
        count: usize,

        #[arg(long, value_parser, default_value = DEFAULT_FALLBACK_DIR)]
        fallback_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    if let Err(e) = run(cli.command).await {
        eprintln!("telemetry_sink error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::InitSchema { database_url } => {
            let pool = open_pool(&database_url).await?;
            create_log_tables(&pool, SCHEMA_TIMEOUT)
                .await
                .context("Failed to create log tables")?;
            pool.close().await;
            println!("Log tables ready in {database_url}");
        }
        Command::Replay {
            database_url,
            table,
            fallback_dir,
        } => {
            let pool = Arc::new(open_pool(&database_url).await?);
            let written = replay_table(Arc::clone(&pool), table, &fallback_dir, REPLAY_BATCH_SIZE)
                .await
                .with_context(|| format!("Failed to replay {table} from {}", fallback_dir.display()))?;
            pool.close().await;
            println!("Replayed {written} entries into {table}");
        }
        Command::Emit {
            database_url,
            count,
            fallback_dir,
        } => {
            let settings = ContextSettings::new(&database_url).with_fallback_dir(fallback_dir);
            let context = LoggingContext::connect(settings)
                .await
                .context("Failed to start logging context")?;
            create_log_tables(context.pool(), SCHEMA_TIMEOUT)
                .await
                .context("Failed to create log tables")?;

            emit_synthetic(&context, count);
            context.shutdown().await;

            let stats = serde_json::to_string_pretty(&context.stats())
                .context("Failed to serialize statistics")?;
            println!("{stats}");
        }
    }
    Ok(())
}

async fn open_pool(database_url: &str) -> Result<ConnectionPoolManager> {
    ConnectionPoolManager::new(PoolConfig::new(database_url))
        .await
        .with_context(|| format!("Failed to open database {database_url}"))
}

/// Logs `count` collection runs, one in ten of them failing.
fn emit_synthetic(context: &LoggingContext, count: usize) {
    const SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOG", "AMZN", "NVDA"];

    context.system().info(&format!("emitting {count} synthetic runs"));
    for i in 0..count {
        let symbol = SYMBOLS[i % SYMBOLS.len()];
        let timer = context.performance().start_timer("daily_prices", "synthetic");
        let id = context
            .data_collection()
            .log_started(symbol, "synthetic", "daily_prices");

        if i % 10 == 9 {
            context.data_collection().log_failure(
                symbol,
                "synthetic",
                "daily_prices",
                "upstream returned HTTP 503",
                Some(&id),
            );
            context.errors().log_error(
                ErrorEvent::new("HttpError", "upstream returned HTTP 503", "synthetic", Severity::Medium)
                    .with_correlation_id(&id)
                    .with_metadata(&serde_json::json!({ "symbol": symbol, "run": i })),
            );
            timer.finish(false, None);
        } else {
            let records = 250 + (i % 5) as i64;
            context.data_collection().log_success(
                symbol,
                "synthetic",
                "daily_prices",
                records,
                timer.elapsed(),
                Some(&id),
            );
            timer.finish(true, Some(records));
        }
    }
    info!("Queued {count} synthetic runs");
}
