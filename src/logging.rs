//! Logging initialisation, powered by tracing-subscriber.
//!
//! Library code only emits `tracing` events. The host calls
//! [`init_logging`] once at start-up; the subscriber lives until exit.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingSettings};

/// Errors from setting up log output.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("No log file configured and no home directory found")]
    NoLogFile,

    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging already initialised: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// `~/.precinct/precinct.log`
pub fn default_log_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".precinct").join("precinct.log"))
}

/// Build the filter from the base level plus quieter third-party crates.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("sqlx", "warn"),
        ("hyper", "warn"),
        ("hyper_util", "warn"),
        ("reqwest", "warn"),
        ("h2", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter = directives.join(",");
    EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter {
        message: e.to_string(),
        filter,
    })
}

/// Install the global subscriber: an append-mode file layer and, when
/// `console` is set, a stderr layer.
///
/// Returns the log file path in use.
pub fn init_logging(settings: &LoggingSettings) -> Result<PathBuf, LoggingError> {
    let path = settings
        .file
        .clone()
        .or_else(default_log_file)
        .ok_or(LoggingError::NoLogFile)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new().create(true).append(true).open(&path)?;

    let console_layer = if settings.console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(build_env_filter(&settings.level)?),
        )
    } else {
        None
    };

    let file_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(Mutex::new(log_file))
            .with_target(true)
            .with_span_list(true)
            .with_filter(build_env_filter(&settings.level)?)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(false)
            .with_writer(Mutex::new(log_file))
            .with_target(true)
            .with_filter(build_env_filter(&settings.level)?)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        level = %settings.level,
        console = settings.console,
        file = %path.display(),
        "logging initialized"
    );
    Ok(path)
}
