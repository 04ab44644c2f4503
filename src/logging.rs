use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{anyhow, Context};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::filter_fn, fmt::layer as fmt_layer, prelude::*, EnvFilter, Registry,
};

use crate::config::{LogRotation, LoggingConfig};

const CRATE_TARGET: &str = "trendnews";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. Events from this crate go to stdout
/// with source locations and, when `logging.file` is set, to a rolling file.
/// Dependency events only reach stdout.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.level.as_deref().unwrap_or("info"))
    });

    let crate_filter = filter_fn(|meta| meta.target().starts_with(CRATE_TARGET));
    let other_filter = filter_fn(|meta| !meta.target().starts_with(CRATE_TARGET));

    let stdout_crate = fmt_layer()
        .with_writer(std::io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_filter(crate_filter.clone());

    let stdout_general = fmt_layer()
        .with_writer(std::io::stdout)
        .with_filter(other_filter);

    let file_layer = file_writer(config)?.map(|writer| {
        fmt_layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_filter(crate_filter)
    });

    Registry::default()
        .with(env_filter)
        .with(stdout_crate)
        .with(stdout_general)
        .with(file_layer)
        .try_init()
        .context("failed to init tracing subscriber")?;

    Ok(())
}

fn file_writer(config: &LoggingConfig) -> anyhow::Result<Option<NonBlocking>> {
    if config.file.trim().is_empty() {
        return Ok(None);
    }

    let (directory, file_name) = split_log_path(Path::new(config.file.trim()))?;
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;

    let appender = RollingFileAppender::new(rotation(config.rotation), directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    Ok(Some(writer))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    }
}

fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid log file path {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((directory, file_name.to_string()))
}
