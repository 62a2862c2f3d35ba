//! Logging setup for the `drivetune` binary.
//!
//! Human-readable lines go to stderr so they never mix with command output.
//! A JSON copy goes to a rolling file under the data directory.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events pass the level filters. Everything else is held at `warn`.
const OWN_TARGETS: [&str; 2] = ["drivetune", "drivetune_core"];

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory holding the rolling log files.
    pub directory: PathBuf,
    /// File name prefix, e.g. `drivetune.2026-01-15.log`.
    pub file_prefix: String,
    /// Level shown on stderr unless `RUST_LOG` is set.
    pub console_level: Level,
    /// Level written to the log file.
    pub file_level: Level,
    /// Rotation schedule.
    pub rotation: LogRotation,
    /// Rotated files to keep.
    pub max_files: usize,
    /// Source file and line in console output.
    pub show_source: bool,
}

/// Rotation schedule for the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// One file, never rotated.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Debug builds: chatty console, trace-level file, hourly files for a day.
    #[must_use]
    pub fn development() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: "drivetune".to_string(),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            rotation: LogRotation::Hourly,
            max_files: 24,
            show_source: true,
        }
    }

    /// Release builds: info on the console, debug in daily files for a week.
    #[must_use]
    pub fn production() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: "drivetune".to_string(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
            max_files: 7,
            show_source: false,
        }
    }

    /// [`development`](Self::development) in debug builds, otherwise [`production`](Self::production).
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Preset for `--verbose`: debug on the console whatever the build.
    #[must_use]
    pub fn verbose() -> Self {
        Self::auto().with_console_level(Level::DEBUG)
    }

    #[must_use]
    pub fn with_directory(mut self, directory: PathBuf) -> Self {
        self.directory = directory;
        self
    }

    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Filter string passing our crates at `level` and dependencies at `warn`.
fn directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    let mut out = String::from("warn");
    for target in OWN_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Flushes the log file when dropped. Hold it until `main` returns.
pub struct LoggingGuard {
    _worker: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when the log directory or file cannot be created, or when a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    std::fs::create_dir_all(&config.directory).map_err(|e| LoggingError::Directory {
        path: config.directory.clone(),
        reason: e.to_string(),
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(config.console_level)));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_source)
        .with_file(config.show_source)
        .with_line_number(config.show_source)
        .with_filter(console_filter);

    let file = fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(EnvFilter::new(directives(config.file_level)));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _worker: worker })
}

/// `<data dir>/drivetune/logs`, or `./drivetune/logs` when there is no data dir.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_default()
        .join("drivetune")
        .join("logs")
}

/// Why logging could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Cannot create log directory {path}: {reason}")]
    Directory {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// The rolling appender could not be built.
    #[error("Cannot open log file: {0}")]
    Appender(String),

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
