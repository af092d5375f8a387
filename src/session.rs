//! Session acquisition.
//!
//! A stored cookie file is preferred over a fresh login. Stored cookies are
//! validated by use; when they are missing or rejected the manager logs in
//! with credentials and writes the new cookies back for the next run.

use crate::api::ProfileApi;
use crate::config::Credentials;
use crate::error::{Result, ScrapeError};
use crate::retry::FetchController;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Cookie name to value, as stored in the cookies file.
pub type CookieJar = BTreeMap<String, String>;

/// Where a session's cookies came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Stored,
    FreshLogin,
}

/// Authenticated context for API calls. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookies: CookieJar,
    source: SessionSource,
}

impl Session {
    #[must_use]
    pub const fn new(cookies: CookieJar, source: SessionSource) -> Self {
        Self { cookies, source }
    }

    #[must_use]
    pub const fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    #[must_use]
    pub const fn source(&self) -> SessionSource {
        self.source
    }

    /// Value for the `Cookie` request header.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The CSRF token mirrors the `ct0` cookie.
    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.cookies.get("ct0").map(String::as_str)
    }
}

/// Read a cookies file. `Ok(None)` if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or is not a JSON
/// object of strings.
pub fn load_cookies(path: &Path) -> Result<Option<CookieJar>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| ScrapeError::path_error("read", path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write a cookies file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_cookies(path: &Path, cookies: &CookieJar) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScrapeError::path_error("create directory", parent, e))?;
    }
    let content = serde_json::to_string_pretty(cookies)?;
    std::fs::write(path, content).map_err(|e| ScrapeError::path_error("write", path, e))
}

/// Establishes the run's [`Session`].
pub struct SessionManager {
    api: Arc<dyn ProfileApi>,
    fetch: FetchController,
    cookies_path: PathBuf,
    credentials: Credentials,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        fetch: FetchController,
        cookies_path: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> Self {
        Self {
            api,
            fetch,
            cookies_path: cookies_path.into(),
            credentials,
        }
    }

    /// Stored cookies if they still work, otherwise a fresh login.
    ///
    /// # Errors
    ///
    /// `ScrapeError::Config` when there is neither a cookie file nor any
    /// credentials; `ScrapeError::Auth` when no valid session can be had.
    pub async fn acquire(&self) -> Result<Session> {
        self.acquire_with(false).await
    }

    /// Like [`acquire`](Self::acquire); `force_login` ignores stored cookies.
    ///
    /// # Errors
    ///
    /// See [`acquire`](Self::acquire).
    #[instrument(skip(self), fields(cookies = %self.cookies_path.display()))]
    pub async fn acquire_with(&self, force_login: bool) -> Result<Session> {
        let mut stored_rejected = false;

        if !force_login {
            match load_cookies(&self.cookies_path) {
                Ok(Some(jar)) if !jar.is_empty() => {
                    let session = Session::new(jar, SessionSource::Stored);
                    match self
                        .fetch
                        .call("verify_session", || self.api.verify_session(&session))
                        .await
                    {
                        Ok(()) => {
                            info!("Loaded cookies from file");
                            return Ok(session);
                        }
                        Err(ScrapeError::Auth { .. }) => {
                            warn!("Stored cookies were rejected, falling back to credential login");
                            stored_rejected = true;
                        }
                        Err(e) => {
                            return Err(ScrapeError::auth(format!(
                                "could not validate stored cookies: {e}"
                            )));
                        }
                    }
                }
                Ok(Some(_)) => warn!("Cookies file is empty, ignoring it"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Could not read cookies file, ignoring it"),
            }
        }

        if !self.credentials.is_usable() {
            if stored_rejected {
                return Err(ScrapeError::auth(
                    "stored cookies were rejected and no credentials are configured",
                ));
            }
            if self.credentials.has_any() {
                return Err(ScrapeError::config(
                    "incomplete credentials: a username or email and a password are required",
                ));
            }
            return Err(ScrapeError::config(format!(
                "no stored session at '{}' and no credentials configured",
                self.cookies_path.display()
            )));
        }

        self.login().await
    }

    async fn login(&self) -> Result<Session> {
        let cookies = match self
            .fetch
            .call("login", || self.api.login(&self.credentials))
            .await
        {
            Ok(jar) => jar,
            Err(e @ ScrapeError::Auth { .. }) => return Err(e),
            Err(e) => return Err(ScrapeError::auth(format!("login failed: {e}"))),
        };

        if cookies.is_empty() {
            return Err(ScrapeError::auth("login returned no session cookies"));
        }

        save_cookies(&self.cookies_path, &cookies)?;
        info!("Logged in and saved cookies to file");
        Ok(Session::new(cookies, SessionSource::FreshLogin))
    }
}
