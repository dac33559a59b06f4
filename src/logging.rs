//! Tracing subscriber setup
//!
//! `RUST_LOG`, when set, replaces the computed filter outright. Console
//! output goes to stdout; `[logging] file` adds a rolling file beside it.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Flushes the file writer when dropped; hold it until exit
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the process-wide subscriber for `serve`
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuard> {
    let level = effective_level(&settings.level, verbose, quiet);

    let (file_writer, guard) = match settings.file.as_deref() {
        Some(path) => {
            let (writer, guard) = open_log_file(path, settings)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(level_filter(level)?)
        .with(fmt_layer(std::io::stdout, settings.json_format, true))
        .with(file_writer.map(|writer| fmt_layer(writer, settings.json_format, false)))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::info!(
        level = %level,
        file = ?settings.file,
        json = settings.json_format,
        "Logging initialized"
    );

    Ok(LogGuard { _file: guard })
}

/// Stderr-only logging for one-shot subcommands
pub fn init_simple(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(fmt::layer().compact().without_time().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// `-q` beats `-v`, which beats the configured level
fn effective_level(configured: &str, verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => configured.parse().unwrap_or(Level::INFO),
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn level_filter(level: Level) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    // tungstenite logs every frame at debug
    let level = level.to_string().to_lowercase();
    EnvFilter::try_new(format!(
        "{level},wwc_hub={level},tungstenite=warn,tokio_tungstenite=warn"
    ))
    .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// One formatting layer, shared by the console and file outputs
fn fmt_layer<S, W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(ansi);

    if json {
        layer
            .json()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        layer.compact().boxed()
    }
}

fn open_log_file(path: &str, settings: &LoggingSettings) -> Result<(NonBlocking, WorkerGuard)> {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    std::fs::create_dir_all(dir).map_err(|source| Error::IoWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("wwc-hub");

    // Rotation is time based; small size budgets rotate hourly
    let rotation = match settings.max_file_size_mb {
        1..=9 => Rotation::HOURLY,
        _ => Rotation::DAILY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(settings.max_files.max(1) as usize)
        .build(dir)
        .map_err(|e| Error::Config(format!("Failed to open log file {}: {}", path.display(), e)))?;

    Ok(tracing_appender::non_blocking(appender))
}
