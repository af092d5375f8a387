//! Shared fixtures for the integration tests.
//!
//! [`FakeApi`] is an in-memory [`ProfileApi`] whose behavior is scripted per
//! handle and per collection, and which records every call it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use xprofiles::{
    Config, CookieJar, Credentials, FetchOutcome, ProfileApi, Session, Tweet, TweetKind,
    TweetPage, UserProfile,
};

pub const VALID_TOKEN: &str = "valid-token";

#[derive(Default)]
pub struct FakeApi {
    users: HashMap<String, UserProfile>,
    tweets: HashMap<(String, TweetKind), Vec<Tweet>>,
    /// Profile lookups that are always throttled.
    limited_profiles: HashSet<String>,
    /// Collections that are always throttled.
    limited_collections: HashSet<(String, TweetKind)>,
    /// Remaining throttled responses before a profile lookup succeeds.
    transient_limits: Mutex<HashMap<String, usize>>,
    /// Cookies handed out by a successful login; `None` rejects logins.
    login_cookies: Option<CookieJar>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, handle: &str, id: &str) -> Self {
        self.users.insert(
            handle.to_string(),
            UserProfile {
                id: id.to_string(),
                name: format!("{handle} display"),
                screen_name: handle.to_string(),
                followers_count: 10,
                ..UserProfile::default()
            },
        );
        self
    }

    /// Give `user_id` `count` tweets in `kind`, ids `<prefix><n>`.
    pub fn with_tweets(mut self, user_id: &str, kind: TweetKind, count: usize) -> Self {
        let prefix = match kind {
            TweetKind::Recent => "t",
            TweetKind::Highlighted => "h",
        };
        let tweets = (1..=count)
            .map(|n| Tweet {
                tweet_id: format!("{prefix}{user_id}-{n}"),
                text: format!("tweet {n} from {user_id}"),
                favorite_count: n as u64,
                ..Tweet::default()
            })
            .collect();
        self.tweets.insert((user_id.to_string(), kind), tweets);
        self
    }

    pub fn always_limit_profile(mut self, handle: &str) -> Self {
        self.limited_profiles.insert(handle.to_string());
        self
    }

    pub fn always_limit_collection(mut self, user_id: &str, kind: TweetKind) -> Self {
        self.limited_collections.insert((user_id.to_string(), kind));
        self
    }

    pub fn limit_profile_times(self, handle: &str, times: usize) -> Self {
        self.transient_limits
            .lock()
            .unwrap()
            .insert(handle.to_string(), times);
        self
    }

    pub fn accept_login(mut self) -> Self {
        self.login_cookies = Some(jar(VALID_TOKEN));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn authorized(session: &Session) -> bool {
        session.cookies().get("auth_token").map(String::as_str) == Some(VALID_TOKEN)
    }
}

#[async_trait]
impl ProfileApi for FakeApi {
    async fn login(&self, _credentials: &Credentials) -> FetchOutcome<CookieJar> {
        self.record("login".into());
        match &self.login_cookies {
            Some(cookies) => FetchOutcome::Success(cookies.clone()),
            None => FetchOutcome::Unauthorized("HTTP 401".into()),
        }
    }

    async fn verify_session(&self, session: &Session) -> FetchOutcome<()> {
        self.record("verify".into());
        if Self::authorized(session) {
            FetchOutcome::Success(())
        } else {
            FetchOutcome::Unauthorized("HTTP 401".into())
        }
    }

    async fn fetch_user(&self, session: &Session, handle: &str) -> FetchOutcome<UserProfile> {
        self.record(format!("user:{handle}"));
        if !Self::authorized(session) {
            return FetchOutcome::Unauthorized("HTTP 401".into());
        }
        if self.limited_profiles.contains(handle) {
            return FetchOutcome::RateLimited(None);
        }
        if let Some(remaining) = self.transient_limits.lock().unwrap().get_mut(handle) {
            if *remaining > 0 {
                *remaining -= 1;
                return FetchOutcome::RateLimited(None);
            }
        }
        match self.users.get(handle) {
            Some(user) => FetchOutcome::Success(user.clone()),
            None => FetchOutcome::Failure("HTTP 404: User not found".into()),
        }
    }

    async fn fetch_tweets(
        &self,
        _session: &Session,
        user_id: &str,
        kind: TweetKind,
        count: usize,
        cursor: Option<&str>,
    ) -> FetchOutcome<TweetPage> {
        self.record(format!("{kind}:{user_id}"));
        let key = (user_id.to_string(), kind);
        if self.limited_collections.contains(&key) {
            return FetchOutcome::RateLimited(None);
        }

        let all = self.tweets.get(&key).cloned().unwrap_or_default();
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + count).min(all.len());
        let tweets = all.get(start..end).map(<[Tweet]>::to_vec).unwrap_or_default();
        let next_cursor = (end < all.len()).then(|| end.to_string());
        FetchOutcome::Success(TweetPage {
            tweets,
            next_cursor,
        })
    }
}

pub fn jar(token: &str) -> CookieJar {
    let mut jar = CookieJar::new();
    jar.insert("auth_token".to_string(), token.to_string());
    jar.insert("ct0".to_string(), "csrf".to_string());
    jar
}

/// Config rooted in `dir` with fast retries and no pacing.
pub fn test_config(dir: &Path, handles: &[&str]) -> Config {
    let handles_path = dir.join("usernames.txt");
    std::fs::write(&handles_path, handles.join("\n")).unwrap();

    let mut config = Config::default();
    config.paths.handles = handles_path;
    config.paths.cookies = dir.join("cookies.json");
    config.paths.output_dir = dir.join("out");
    config.retry.max_attempts = 3;
    config.retry.base_delay_secs = 2.0;
    config.retry.max_delay_secs = 60.0;
    config.disable_delays();
    config
}

pub fn store_cookies(config: &Config, token: &str) {
    xprofiles::session::save_cookies(&config.paths.cookies, &jar(token)).unwrap();
}

pub fn credentials() -> Credentials {
    Credentials {
        auth_info_1: Some("someone".into()),
        auth_info_2: Some("someone@example.com".into()),
        password: Some("hunter2".into()),
    }
}
