//! Logging setup for `agentvisor` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `[logger] level` from the config file
//! 3. `AGENTVISOR_LOG` environment variable (e.g. "info", "debug")
//! 4. default to `info`
//!
//! File output goes through `tracing-appender`'s rolling appender, so the
//! `[logger] rotation` and `max_files` settings apply to it.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::cli::LogLevel;
use crate::config::loader::{LogFormat, LogOutput, LogRotation, LoggerConfig};

/// Initialise the global logging subscriber.
///
/// Call once at startup; a second call fails.
pub fn init_logging(cli_level: Option<LogLevel>, cfg: &LoggerConfig) -> Result<()> {
    let level = resolve_level(
        cli_level,
        cfg.level.as_deref(),
        std::env::var("AGENTVISOR_LOG").ok().as_deref(),
    );

    let (writer, ansi) = match cfg.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File => {
            let path = cfg
                .path
                .as_ref()
                .context("logger.path is required when logger.output = \"file\"")?;
            let appender = file_appender(path, cfg.rotation, cfg.max_files)
                .with_context(|| format!("opening log file {path:?}"))?;
            (BoxMakeWriter::new(appender), false)
        }
    };

    let builder = fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(ansi)
        .with_writer(writer);

    match cfg.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("initialising logging: {e}"))
}

/// Builds the appender for `path`. With [`LogRotation::Never`] it writes to
/// `path` itself; otherwise `path`'s file name is the prefix of the dated files.
fn file_appender(
    path: &Path,
    rotation: LogRotation,
    max_files: Option<usize>,
) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .context("log path has no file name")?
        .to_string_lossy()
        .into_owned();

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation_of(rotation))
        .filename_prefix(prefix);
    if let Some(n) = max_files {
        builder = builder.max_log_files(n);
    }
    builder.build(dir).map_err(|e| anyhow!("{e}"))
}

fn rotation_of(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    }
}

/// Picks the effective level from the CLI flag, config value and environment value.
pub fn resolve_level(
    cli: Option<LogLevel>,
    config: Option<&str>,
    env: Option<&str>,
) -> tracing::Level {
    cli.map(level_from_log_level)
        .or_else(|| config.and_then(parse_level_str))
        .or_else(|| env.and_then(parse_level_str))
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
