//! Remote API client.
//!
//! [`ProfileApi`] is the seam between the pipeline and the network. Every
//! method reports a [`FetchOutcome`] instead of an error so the fetch
//! controller can decide what to retry. [`HttpApiClient`] is the reqwest
//! implementation used by the binary.

use crate::config::{ApiConfig, Credentials};
use crate::error::{Result, ScrapeError};
use crate::model::{TweetKind, TweetPage, UserProfile};
use crate::retry::FetchOutcome;
use crate::session::{CookieJar, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{COOKIE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Operations the pipeline needs from the remote service.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Log in with credentials, returning the session cookies.
    async fn login(&self, credentials: &Credentials) -> FetchOutcome<CookieJar>;

    /// Cheap authenticated call used to check stored cookies.
    async fn verify_session(&self, session: &Session) -> FetchOutcome<()>;

    /// Look up a profile by screen name.
    async fn fetch_user(&self, session: &Session, handle: &str) -> FetchOutcome<UserProfile>;

    /// Fetch one page of a user's tweets.
    async fn fetch_tweets(
        &self,
        session: &Session,
        user_id: &str,
        kind: TweetKind,
        count: usize,
        cursor: Option<&str>,
    ) -> FetchOutcome<TweetPage>;
}

/// reqwest-backed [`ProfileApi`].
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    auth_info_1: Option<&'a str>,
    auth_info_2: Option<&'a str>,
    password: Option<&'a str>,
}

const MAX_ERROR_BODY: usize = 200;

impl HttpApiClient {
    /// Create a new API client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ScrapeError::config(format!("invalid api.base_url '{}'", config.base_url))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(req: RequestBuilder, session: &Session) -> RequestBuilder {
        let mut req = req.header(COOKIE, session.cookie_header());
        if let Some(token) = session.csrf_token() {
            req = req.header("x-csrf-token", token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> FetchOutcome<T> {
        let url = self.url(segments);
        debug!(path = url.path(), "GET");
        let req = Self::authorize(self.client.get(url.clone()).query(query), session);
        match req.send().await {
            Ok(response) => decode_response(response).await,
            Err(e) => FetchOutcome::Failure(format!("request to {} failed: {e}", url.path())),
        }
    }
}

#[async_trait]
impl ProfileApi for HttpApiClient {
    #[instrument(skip_all)]
    async fn login(&self, credentials: &Credentials) -> FetchOutcome<CookieJar> {
        let body = LoginRequest {
            auth_info_1: credentials.auth_info_1.as_deref(),
            auth_info_2: credentials.auth_info_2.as_deref(),
            password: credentials.password.as_deref(),
        };
        match self
            .client
            .post(self.url(&["auth", "login"]))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => decode_response(response).await,
            Err(e) => FetchOutcome::Failure(format!("login request failed: {e}")),
        }
    }

    async fn verify_session(&self, session: &Session) -> FetchOutcome<()> {
        self.get_json::<serde_json::Value>(session, &["account", "verify_credentials"], &[])
            .await
            .map(|_| ())
    }

    async fn fetch_user(&self, session: &Session, handle: &str) -> FetchOutcome<UserProfile> {
        self.get_json(session, &["users", "by", "screen_name", handle], &[])
            .await
    }

    async fn fetch_tweets(
        &self,
        session: &Session,
        user_id: &str,
        kind: TweetKind,
        count: usize,
        cursor: Option<&str>,
    ) -> FetchOutcome<TweetPage> {
        let segment = match kind {
            TweetKind::Recent => "tweets",
            TweetKind::Highlighted => "highlights",
        };
        let mut query = vec![("count", count.to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        self.get_json(session, &["users", user_id, segment], &query)
            .await
    }
}

/// Map an HTTP response onto a [`FetchOutcome`].
async fn decode_response<T: DeserializeOwned>(response: Response) -> FetchOutcome<T> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::RateLimited(retry_after_from_headers(response.headers(), Utc::now()));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return FetchOutcome::Unauthorized(format!("HTTP {}", status.as_u16()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
        return FetchOutcome::Failure(format!("HTTP {}: {}", status.as_u16(), snippet.trim()));
    }

    match response.json::<T>().await {
        Ok(value) => FetchOutcome::Success(value),
        Err(e) => FetchOutcome::Failure(format!("invalid response body: {e}")),
    }
}

/// Server-suggested wait: `Retry-After` seconds, else `x-rate-limit-reset`
/// (epoch seconds) relative to `now`.
#[must_use]
pub fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let header_u64 = |name: &str| -> Option<u64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    if let Some(secs) = header_u64(RETRY_AFTER.as_str()) {
        return Some(Duration::from_secs(secs));
    }

    let reset = i64::try_from(header_u64("x-rate-limit-reset")?).ok()?;
    let remaining = reset.saturating_sub(now.timestamp()).max(0);
    Some(Duration::from_secs(remaining.unsigned_abs()))
}
