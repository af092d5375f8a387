//! Configuration system for xprofiles.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **Config file** - `~/.config/xprofiles/config.toml` or `--config <path>`
//! 3. **Environment variables** - `XPROFILES_*`, plus `AUTH_INFO_1`,
//!    `AUTH_INFO_2` and `PASSWORD` for credentials
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! handles = "usernames.txt"
//! cookies = "cookies.json"
//! output_dir = "out"
//!
//! [fetch]
//! tweet_limit = 200
//! highlight_limit = 200
//!
//! [delay]
//! min_secs = 15.0
//! max_secs = 30.0
//!
//! [retry]
//! max_attempts = 5
//! base_delay_secs = 60.0
//! ```

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure for xprofiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Collection limits.
    pub fetch: FetchConfig,
    /// Pacing between handles and between pages.
    pub delay: DelayConfig,
    /// Retry/backoff policy for remote calls.
    pub retry: RetryConfig,
    /// Remote API endpoint settings.
    pub api: ApiConfig,
    /// Login credentials, used only when no stored session works.
    pub credentials: Credentials,
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Handle list, one screen name per line.
    /// Environment variable: `XPROFILES_HANDLES`
    pub handles: PathBuf,

    /// Stored session cookies (JSON).
    /// Environment variable: `XPROFILES_COOKIES`
    pub cookies: PathBuf,

    /// Directory receiving the JSON and CSV outputs.
    /// Environment variable: `XPROFILES_OUTPUT_DIR`
    pub output_dir: PathBuf,

    /// Run log, relative to `output_dir` unless absolute.
    pub log_file: PathBuf,
}

/// Collection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum recent tweets per user.
    /// Environment variable: `XPROFILES_TWEET_LIMIT`
    pub tweet_limit: usize,

    /// Maximum highlighted tweets per user.
    /// Environment variable: `XPROFILES_HIGHLIGHT_LIMIT`
    pub highlight_limit: usize,

    /// Tweets requested per page.
    pub page_size: usize,
}

/// Pacing configuration, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub min_secs: f64,
    pub max_secs: f64,
    pub page_min_secs: f64,
    pub page_max_secs: f64,
}

/// Retry/backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first.
    /// Environment variable: `XPROFILES_MAX_ATTEMPTS`
    pub max_attempts: usize,

    /// First backoff delay; doubles on every further attempt.
    /// Environment variable: `XPROFILES_BASE_DELAY`
    pub base_delay_secs: f64,

    /// Ceiling for computed backoff delays.
    pub max_delay_secs: f64,
}

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Environment variable: `XPROFILES_API_URL`
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Login credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Username. Environment variable: `AUTH_INFO_1`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_info_1: Option<String>,

    /// Email or phone. Environment variable: `AUTH_INFO_2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_info_2: Option<String>,

    /// Environment variable: `PASSWORD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            handles: PathBuf::from(crate::DEFAULT_HANDLES_FILE),
            cookies: PathBuf::from(crate::DEFAULT_COOKIES_FILE),
            output_dir: PathBuf::from("."),
            log_file: PathBuf::from(crate::DEFAULT_LOG_FILE),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tweet_limit: 200,
            highlight_limit: 200,
            page_size: 200,
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min_secs: 15.0,
            max_secs: 30.0,
            page_min_secs: 1.0,
            page_max_secs: 3.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 60.0,
            max_delay_secs: 900.0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.x.com/1.1".to_string(),
            timeout_secs: 30,
            user_agent: format!("xprofiles/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Credentials {
    /// True when at least one credential field is set.
    #[must_use]
    pub const fn has_any(&self) -> bool {
        self.auth_info_1.is_some() || self.auth_info_2.is_some() || self.password.is_some()
    }

    /// A login needs an identifier and a password.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        (self.auth_info_1.is_some() || self.auth_info_2.is_some()) && self.password.is_some()
    }
}

impl Config {
    /// Load configuration from all sources except CLI arguments.
    ///
    /// An explicit `path` must exist; the default user config file is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?.ok_or_else(|| {
                ScrapeError::config(format!("config file not found: {}", p.display()))
            })?,
            None => match Self::user_config_path() {
                Some(p) => Self::load_from_file(&p)?.unwrap_or_default(),
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        debug!("Configuration loaded: {:?}", config.redacted());
        Ok(config)
    }

    /// Load configuration from a specific file. `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScrapeError::path_error("read", path, e))?;
        let config = toml::from_str(&content).map_err(|e| ScrapeError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(Some(config))
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xprofiles").join("config.toml"))
    }

    /// Apply environment variable overrides from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("XPROFILES_HANDLES") {
            self.paths.handles = PathBuf::from(v);
        }
        if let Some(v) = lookup("XPROFILES_COOKIES") {
            self.paths.cookies = PathBuf::from(v);
        }
        if let Some(v) = lookup("XPROFILES_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(v);
        }
        if let Some(n) = lookup("XPROFILES_TWEET_LIMIT").and_then(|v| v.parse().ok()) {
            self.fetch.tweet_limit = n;
        }
        if let Some(n) = lookup("XPROFILES_HIGHLIGHT_LIMIT").and_then(|v| v.parse().ok()) {
            self.fetch.highlight_limit = n;
        }
        if let Some(n) = lookup("XPROFILES_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.retry.max_attempts = n;
        }
        if let Some(n) = lookup("XPROFILES_BASE_DELAY").and_then(|v| v.parse().ok()) {
            self.retry.base_delay_secs = n;
        }
        if let Some(v) = lookup("XPROFILES_API_URL") {
            self.api.base_url = v;
        }

        // Same names the credentials have always used in .env files
        if let Some(v) = lookup("AUTH_INFO_1").filter(|v| !v.is_empty()) {
            self.credentials.auth_info_1 = Some(v);
        }
        if let Some(v) = lookup("AUTH_INFO_2").filter(|v| !v.is_empty()) {
            self.credentials.auth_info_2 = Some(v);
        }
        if let Some(v) = lookup("PASSWORD").filter(|v| !v.is_empty()) {
            self.credentials.password = Some(v);
        }
    }

    /// Check invariants that the rest of the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(ScrapeError::config("retry.max_attempts must be at least 1"));
        }
        if self.fetch.tweet_limit == 0 || self.fetch.highlight_limit == 0 {
            return Err(ScrapeError::config("tweet limits must be greater than 0"));
        }
        if self.fetch.page_size == 0 {
            return Err(ScrapeError::config("fetch.page_size must be greater than 0"));
        }
        for (name, value) in [
            ("delay.min_secs", self.delay.min_secs),
            ("delay.max_secs", self.delay.max_secs),
            ("delay.page_min_secs", self.delay.page_min_secs),
            ("delay.page_max_secs", self.delay.page_max_secs),
            ("retry.base_delay_secs", self.retry.base_delay_secs),
            ("retry.max_delay_secs", self.retry.max_delay_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ScrapeError::config(format!(
                    "{name} must be a non-negative number of seconds that fits a duration, got {value}"
                )));
            }
        }
        if self.delay.min_secs > self.delay.max_secs {
            return Err(ScrapeError::config(
                "delay.min_secs must not exceed delay.max_secs",
            ));
        }
        if self.delay.page_min_secs > self.delay.page_max_secs {
            return Err(ScrapeError::config(
                "delay.page_min_secs must not exceed delay.page_max_secs",
            ));
        }
        Ok(())
    }

    /// Remove every pause (used by `run --no-delay` and tests).
    pub fn disable_delays(&mut self) {
        self.delay.min_secs = 0.0;
        self.delay.max_secs = 0.0;
        self.delay.page_min_secs = 0.0;
        self.delay.page_max_secs = 0.0;
    }

    /// Where the run log is written.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        if self.paths.log_file.is_absolute() {
            self.paths.log_file.clone()
        } else {
            self.paths.output_dir.join(&self.paths.log_file)
        }
    }

    /// Copy with the password masked, safe for display and logs.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.credentials.password.is_some() {
            copy.credentials.password = Some("********".to_string());
        }
        copy
    }

    /// Look up a single dotted key (e.g. `retry.max_attempts`).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = toml::Value::try_from(self.redacted()).ok()?;
        let mut current = &value;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(match current {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Render the configuration as TOML, password masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }

    /// Generate a default configuration file content.
    #[must_use]
    pub fn default_config_content() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
