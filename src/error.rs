//! Error types for xprofiles.
//!
//! Startup failures (`Auth`, `Config`) are fatal. Everything that goes wrong
//! while talking to the remote API is contained at the batch boundary and
//! only logged.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Primary error type for xprofiles operations.
#[derive(Error, Debug)]
pub enum ScrapeError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    /// No valid session could be obtained.
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    // =========================================================================
    // Remote Call Errors
    // =========================================================================
    /// The remote API asked us to slow down.
    #[error("Rate limited{}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// A remote call kept failing until its retry budget ran out.
    #[error("{operation} failed after {attempts} attempt(s): {last_reason}")]
    FetchExhausted {
        operation: String,
        attempts: usize,
        last_reason: String,
    },

    /// The profile for a handle could not be collected; the handle is skipped.
    #[error("Skipping @{handle}: {source}")]
    Collector {
        handle: String,
        #[source]
        source: Box<ScrapeError>,
    },

    /// A response or record had an unexpected shape.
    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or missing configuration, credentials, or handle list.
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    // =========================================================================
    // IO and Encoding Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding/decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML serialization failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| format!(", retry after {}s", d.as_secs()))
}

/// Result type alias for xprofiles operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

impl ScrapeError {
    /// Create an authentication error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create an invalid-data error.
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidData {
            reason: reason.into(),
        }
    }

    /// Create a fetch-exhausted error.
    pub fn fetch_exhausted(
        operation: impl Into<String>,
        attempts: usize,
        last_reason: impl Into<String>,
    ) -> Self {
        Self::FetchExhausted {
            operation: operation.into(),
            attempts,
            last_reason: last_reason.into(),
        }
    }

    /// Wrap a per-handle failure.
    pub fn collector(handle: impl Into<String>, source: Self) -> Self {
        Self::Collector {
            handle: handle.into(),
            source: Box::new(source),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Errors that abort the run before any handle is processed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::Config { .. } | Self::ConfigFile { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Auth { .. } => Some(
                "Delete the cookies file and set AUTH_INFO_1, AUTH_INFO_2 and PASSWORD to log in again.",
            ),
            Self::Config { .. } => {
                Some("Run 'xprofiles config --default' to see every recognized option.")
            }
            Self::ConfigFile { .. } => {
                Some("Fix the TOML syntax or remove the file to fall back to defaults.")
            }
            Self::FetchExhausted { .. } => {
                Some("Raise retry.max_attempts or retry.base_delay_secs and try again later.")
            }
            _ => None,
        }
    }
}

/// Attach a human-readable context line to foreign errors.
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context string.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::WithContext`] around the original error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], but builds the message only on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::WithContext`] around the original error.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| ScrapeError::with_context(context, source))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| ScrapeError::with_context(f(), source))
    }
}

// =============================================================================
// Terminal rendering
// =============================================================================

use colored::Colorize;
use std::fmt::Write as _;

/// Render an error block for stderr.
///
/// The first line carries the title. `detail`, when present, is indented
/// underneath, followed by one `Hint:` line or a bulleted `Try:` list.
#[must_use]
pub fn format_error(title: &str, detail: &str, hints: &[&str]) -> String {
    let mut out = format!("{} {}", "✗".red().bold(), title.bold());
    if !detail.is_empty() {
        let _ = write!(out, "\n\n   {detail}");
    }
    match hints {
        [] => {}
        [only] => {
            let _ = write!(out, "\n\n   {} {only}", "Hint:".cyan());
        }
        many => {
            let _ = write!(out, "\n\n   {}", "Try:".cyan());
            for hint in many {
                let _ = write!(out, "\n     {} {hint}", "-".dimmed());
            }
        }
    }
    out
}

/// Edit distance between `a` and `b`, counted in chars.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();
    // row[j] holds the distance between the prefix of `a` seen so far and target[..j]
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in target.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[target.len()]
}

/// Closest candidate to `input`, ignoring case, within `max_distance` edits
/// (2 when `None`). An exact match yields `None`.
#[must_use]
pub fn find_closest_match<'a>(
    input: &str,
    candidates: &[&'a str],
    max_distance: Option<usize>,
) -> Option<&'a str> {
    let limit = max_distance.unwrap_or(2);
    let needle = input.to_lowercase();

    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let distance = levenshtein_distance(&needle, &candidate.to_lowercase());
        if distance == 0 || distance > limit {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[must_use]
pub fn format_did_you_mean(suggestion: &str) -> String {
    format!("Did you mean '{}'?", suggestion.green())
}

/// Error block for an unrecognized name, with a did-you-mean hint and, for
/// short option lists, every accepted value.
#[must_use]
pub fn format_unknown_value_error(kind: &str, input: &str, valid_options: &[&str]) -> String {
    let mut hints: Vec<String> = find_closest_match(input, valid_options, None)
        .map(format_did_you_mean)
        .into_iter()
        .collect();
    if valid_options.len() <= 8 {
        hints.push(format!("Valid {kind}s: {}", valid_options.join(", ")));
    }

    let hints: Vec<&str> = hints.iter().map(String::as_str).collect();
    format_error(&format!("Unknown {kind}: '{input}'"), "", &hints)
}

/// Keys accepted by `xprofiles config --get`.
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "paths.handles",
    "paths.cookies",
    "paths.output_dir",
    "paths.log_file",
    "fetch.tweet_limit",
    "fetch.highlight_limit",
    "fetch.page_size",
    "delay.min_secs",
    "delay.max_secs",
    "delay.page_min_secs",
    "delay.page_max_secs",
    "retry.max_attempts",
    "retry.base_delay_secs",
    "retry.max_delay_secs",
    "api.base_url",
    "api.timeout_secs",
    "api.user_agent",
];
