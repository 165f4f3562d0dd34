//! # Logging Utilities
//!
//! Logging setup for symline binaries using `tracing`.
//!
//! Logs go to stderr so they never mix with command output on stdout, and
//! optionally to a daily-rolling file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symline_utils::init_logging;
//!
//! // Keep the guard alive until exit so buffered file output is flushed.
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=symline_core=trace`)
//! - `SYMLINE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `SYMLINE_LOG_FILE`: Optional path of an additional log file

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "SYMLINE_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const ENV_LOG_FILE: &str = "SYMLINE_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the file writer alive; buffered file output is flushed on drop.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// `RUST_LOG` sets the filter (default `warn`), `SYMLINE_LOG_FORMAT` the
/// format and `SYMLINE_LOG_FILE` an extra output file.
///
/// ## Errors
///
/// - `InvalidFormat` when `SYMLINE_LOG_FORMAT` holds an unknown value
/// - `InitializationFailed` when a global subscriber is already installed
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(ENV_LOG_FORMAT) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };

    // A command-line tool stays quiet unless asked.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()));
    let log_file = env::var_os(ENV_LOG_FILE).map(PathBuf::from);

    init_logging_internal(format, filter, log_file.as_deref())
}

/// Initialize logging with an explicit level and format.
///
/// `RUST_LOG` is ignored; `SYMLINE_LOG_FILE` is still honored.
///
/// ## Example
///
/// ```rust,no_run
/// use symline_utils::{init_logging_with_level, LogFormat, LogLevel};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns `InitializationFailed` when a global subscriber is already
/// installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    let log_file = env::var_os(ENV_LOG_FILE).map(PathBuf::from);
    init_logging_internal(format, filter, log_file.as_deref())
}

fn init_logging_internal(format: LogFormat, filter: EnvFilter, log_file: Option<&Path>) -> Result<LoggingGuard, LoggingError>
{
    let console_layer = output_layer(format, io::stderr, true, filter.clone());

    let mut guard = None;
    let file_layer = log_file.map(|path| {
        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_default(),
        );
        let (non_blocking, worker) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker);
        // No ANSI in files
        output_layer(format, non_blocking, false, filter)
    });

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// One formatted output with its own filter.
fn output_layer<S, W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(ansi);

    match format {
        LogFormat::Pretty => layer.with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),
}
