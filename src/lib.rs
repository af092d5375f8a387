//! xprofiles - Resilient collection of public X profiles and tweets
//!
//! This library reads a list of handles, fetches each profile with its recent
//! and highlighted tweets through a rate-limit-aware client, and writes the
//! results as one JSON document plus three CSV files.
//!
//! # Modules
//!
//! - [`api`] - Remote API seam and the reqwest client
//! - [`retry`] - Retry/backoff controller and pacing delays
//! - [`session`] - Cookie persistence and login fallback
//! - [`collector`] - Per-handle profile and tweet collection
//! - [`batch`] - Sequential batch driver with interruption support
//! - [`pipeline`] - End-to-end run orchestration
//! - [`output`] - JSON and CSV writers

pub mod api;
pub mod batch;
pub mod cli;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod handles;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod session;

pub use api::{HttpApiClient, ProfileApi};
pub use batch::BatchDriver;
pub use collector::ProfileCollector;
pub use config::{Config, Credentials};
pub use context::RunContext;
pub use error::{
    Result, ResultExt, ScrapeError, VALID_CONFIG_KEYS, find_closest_match, format_did_you_mean,
    format_error, format_unknown_value_error,
};
pub use model::*;
pub use output::OutputPaths;
pub use pipeline::RunReport;
pub use retry::{
    DelayRange, FetchController, FetchOutcome, RecordingSleeper, RetryPolicy, Sleeper,
    TokioSleeper,
};
pub use session::{CookieJar, Session, SessionManager, SessionSource};

use std::time::Duration;

/// Default handle list, relative to the working directory
pub const DEFAULT_HANDLES_FILE: &str = "usernames.txt";

/// Default cookies file, relative to the working directory
pub const DEFAULT_COOKIES_FILE: &str = "cookies.json";

/// Default run log, relative to the output directory
pub const DEFAULT_LOG_FILE: &str = "xprofiles.log";

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Format an elapsed duration as `1h 02m 03s`, `2m 05s` or `4.2s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{:.1}s", duration.as_secs_f64());
    }
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}
