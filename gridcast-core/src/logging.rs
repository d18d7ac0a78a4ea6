use std::ffi::OsStr;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration
///
/// Supports both JSON (production) and pretty (development) formats with
/// configurable log levels and optional file output. When logging to a file
/// the writer is non-blocking; the returned guard must stay alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let log_level = parse_log_level(&config.level)?;

    // Create env filter from config level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let file_writer = match &config.file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| OsStr::new("gridcast.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            Some(tracing_appender::non_blocking(appender))
        }
        None => None,
    };

    let guard = if config.format.as_str() == "json" {
        // JSON format for production (structured logging)
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_line_number(true)
            .with_file(true);

        match file_writer {
            Some((writer, guard)) => {
                registry.with(json_layer.with_writer(writer)).init();
                Some(guard)
            }
            None => {
                registry.with(json_layer).init();
                None
            }
        }
    } else {
        // Pretty format for development (human-readable)
        let pretty_layer = fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_line_number(true)
            .with_file(false);

        match file_writer {
            Some((writer, guard)) => {
                registry
                    .with(pretty_layer.with_writer(writer).with_ansi(false))
                    .init();
                Some(guard)
            }
            None => {
                registry.with(pretty_layer).init();
                None
            }
        }
    };

    Ok(guard)
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
