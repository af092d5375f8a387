//! Logging setup for xprofiles.
//!
//! Console records go to stderr so stdout stays clean for summaries and
//! `--format json`. A run can additionally append INFO-and-above records,
//! without colors, to a log file that accumulates across runs.
//!
//! ```rust,no_run
//! use xprofiles::logging::{init_logging, LogConfig, Verbosity};
//!
//! init_logging(&LogConfig::new(Verbosity::Normal).with_file("out/xprofiles.log")).ok();
//! tracing::info!("Collector started");
//! ```

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::error::{Result, ScrapeError};

/// Filter applied to the log file regardless of console verbosity.
const FILE_FILTER: &str = "xprofiles=info";

/// How chatty the console should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only, no timestamps.
    Quiet,
    /// Per-handle progress at INFO.
    #[default]
    Normal,
    /// DEBUG records with module targets, including each remote attempt.
    Verbose,
}

impl Verbosity {
    /// Pick a verbosity from the `--quiet` / `--verbose` flags.
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "xprofiles=error",
            Self::Normal => "xprofiles=info",
            Self::Verbose => "xprofiles=debug",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbosity: Verbosity,
    /// Disable ANSI escapes on the console (set when `NO_COLOR` is present).
    pub plain: bool,
    /// Append INFO-and-above records to this file as well.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            plain: std::env::var_os("NO_COLOR").is_some(),
            file: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn console_layer<S>(config: &LogConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(config.verbosity.directive()),
    };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!config.plain)
        .compact();

    match config.verbosity {
        Verbosity::Quiet => layer
            .without_time()
            .with_target(false)
            .with_filter(filter)
            .boxed(),
        Verbosity::Normal => layer.with_target(false).with_filter(filter).boxed(),
        Verbosity::Verbose => layer.with_target(true).with_filter(filter).boxed(),
    }
}

fn file_layer<S>(path: &Path) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScrapeError::path_error("create directory", parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ScrapeError::path_error("open log file", path, e))?;

    Ok(fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new(FILE_FILTER))
        .boxed())
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the console filter but never the file
/// filter. Only the first call in a process takes effect.
///
/// # Errors
///
/// Returns an error if the log file or its directory cannot be created.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut layers = vec![console_layer(config)];
    if let Some(path) = &config.file {
        layers.push(file_layer(path)?);
    }

    tracing_subscriber::registry().with(layers).try_init().ok();
    Ok(())
}

/// Install logging from CLI flags.
///
/// # Errors
///
/// Returns an error if `file` is given and cannot be opened.
pub fn init_cli_logging(quiet: bool, verbose: bool, file: Option<PathBuf>) -> Result<()> {
    let mut config = LogConfig::new(Verbosity::from_flags(quiet, verbose));
    config.file = file;
    init_logging(&config)
}

/// Logs the start of a named operation, then its outcome and duration.
#[must_use = "call complete() or fail() to log the outcome"]
pub struct OperationGuard {
    name: &'static str,
    started: Instant,
}

impl OperationGuard {
    pub fn new(name: &'static str) -> Self {
        tracing::info!(operation = name, "Starting");
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn complete(self) {
        tracing::info!(
            operation = self.name,
            elapsed_ms = self.started.elapsed().as_millis(),
            "Finished"
        );
    }

    pub fn fail(self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = self.name,
            elapsed_ms = self.started.elapsed().as_millis(),
            error = %error,
            "Aborted"
        );
    }
}

/// Log `done` out of `total` with a rounded percentage.
#[macro_export]
macro_rules! log_progress {
    ($done:expr, $total:expr, $($arg:tt)*) => {{
        let (done, total) = ($done, $total);
        tracing::info!(
            done,
            total,
            percent = (done as f64 * 100.0 / (total as f64).max(1.0)).round() as u32,
            $($arg)*
        );
    }};
}
