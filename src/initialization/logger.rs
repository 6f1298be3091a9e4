//! Logger initialization.
//!
//! Diagnostics of the sink itself (writer start/stop, fallback routing,
//! breaker transitions) go through the `log` facade. This installs
//! `env_logger` as the backend with either coloured plain lines or JSON lines.

use std::io::Write;

use chrono::Utc;
use colored::*;
use log::{Level, LevelFilter};

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

/// Initializes the logger with the specified level and format.
///
/// `RUST_LOG` is read first; `level` then overrides it for this crate and
/// as the global default. Per-module directives in `RUST_LOG` still apply
/// to other crates.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already installed.
///
/// # Examples
///
/// ```bash
/// # Verbose sink internals, quiet sqlx
/// RUST_LOG=sqlx=warn telemetry_sink --log-level debug emit --count 100
///
/// # Machine-readable output
/// telemetry_sink --log-format json replay --table error_logs
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    // sqlx logs every statement at info
    builder.filter_module("sqlx", LevelFilter::Warn);
    builder.filter_module("telemetry_sink", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    json_line(record.level(), record.target(), &record.args().to_string())
                )
            });
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} [{}] {}",
                    Utc::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    record.target().cyan(),
                    colored_level(record.level()),
                    record.args()
                )
            });
        }
    }

    // try_init so tests and embedding applications can call this repeatedly
    builder.try_init().map_err(InitializationError::from)?;

    Ok(())
}

fn colored_level(level: Level) -> ColoredString {
    let label = level.to_string();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

fn json_line(level: Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "ts": Utc::now().timestamp_millis(),
        "level": level.as_str(),
        "target": target,
        "msg": message,
    })
    .to_string()
}
