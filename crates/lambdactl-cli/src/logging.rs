// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::APP_NAME;

pub const LOG_FILTER_ENV: &str = "LAMBDACTL_LOG";
const LOG_FILE_PREFIX: &str = "lambdactl.log";

/// Flushes buffered log lines when dropped. Hold it until the process exits.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub dir: PathBuf,
}

/// Logs go to a daily file, never to the terminal the console draws on.
pub fn init(level: &str, dir: Option<PathBuf>) -> Result<LogGuard> {
    let dir = match dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(level)?)
        .with(layer)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;

    tracing::debug!(log_dir = %dir.display(), "logging initialized");
    Ok(LogGuard {
        _file_guard: guard,
        dir,
    })
}

/// `LAMBDACTL_LOG` takes a full filter directive and wins over the config
/// level, which only scopes our own crates.
fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(directive) = std::env::var(LOG_FILTER_ENV)
        && !directive.trim().is_empty()
    {
        return EnvFilter::try_new(directive.trim())
            .with_context(|| format!("invalid {LOG_FILTER_ENV} filter {directive:?}"));
    }
    EnvFilter::try_new(default_directive(level))
        .with_context(|| format!("invalid log level {level:?}"))
}

fn default_directive(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    [
        "lambdactl",
        "lambdactl_api",
        "lambdactl_app",
        "lambdactl_tui",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

pub fn default_log_dir() -> Result<PathBuf> {
    let root = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow!("cannot resolve a state directory; set [log].dir in the config"))?;
    Ok(log_dir_under(&root))
}

fn log_dir_under(root: &Path) -> PathBuf {
    root.join(APP_NAME).join("logs")
}
