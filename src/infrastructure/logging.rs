//! Logging system configuration and initialization
//!
//! - Console output with local timestamps
//! - Rolling log file (hourly, daily or never) with bounded history
//! - Optional JSON lines in the file
//! - `RUST_LOG` overrides the configured level

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::{LogRotation, LoggingConfig};

// Keeps the non-blocking file writer flushing until process exit
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Dependencies that are chatty below `warn`
const NOISY_TARGETS: &[&str] = &["sqlx", "headless_chrome", "tungstenite", "hyper", "html5ever", "selectors"];

/// Local wall-clock timestamps with milliseconds and offset
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Resolve the configured log directory; relative paths are taken from the working directory
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    let dir = PathBuf::from(&config.log_dir);
    if dir.is_absolute() {
        dir
    } else {
        std::env::current_dir().unwrap_or_default().join(dir)
    }
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for target in NOISY_TARGETS {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}

fn file_appender(log_dir: &Path, config: &LoggingConfig) -> Result<rolling::RollingFileAppender> {
    let rotation = match config.rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };

    let mut builder = rolling::Builder::new()
        .rotation(rotation)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log");
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }

    builder
        .build(log_dir)
        .map_err(|e| anyhow!("Failed to create log file appender in {:?}: {}", log_dir, e))
}

/// Initialize logging with custom configuration
///
/// Fails when neither console nor file output is enabled, or when a global
/// subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(config)?;
    let log_dir = get_log_directory(config);

    let (file_plain, file_json) = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

        let (writer, guard) = tracing_appender::non_blocking(file_appender(&log_dir, config)?);
        // A second init keeps the first guard; the new writer is dropped with the failed init below
        let _ = LOG_GUARD.set(guard);

        if config.json_format {
            let layer = fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            (None, Some(layer))
        } else {
            let layer = fmt::Layer::new()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false);
            (Some(layer), None)
        }
    } else {
        (None, None)
    };

    let console = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    });

    Registry::default()
        .with(env_filter)
        .with(console)
        .with(file_plain)
        .with(file_json)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!(
            "Log files: {:?} (prefix '{}', rotation {:?}, keep {})",
            log_dir, config.file_prefix, config.rotation, config.max_files
        );
    }
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== review-crawler {} ===", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}
