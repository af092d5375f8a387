//! Data models for collected X profiles and tweets.
//!
//! The same structs are used to decode API responses and to encode the
//! JSON/CSV output, so field order here is the column order of the CSVs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Public profile metadata for one handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub screen_name: String,
    #[serde(deserialize_with = "deserialize_x_date")]
    pub created_at: Option<DateTime<Utc>>,
    pub description: String,
    pub location: String,
    pub url: Option<String>,
    pub profile_image_url: Option<String>,
    pub protected: bool,
    pub is_blue_verified: bool,
    #[serde(deserialize_with = "deserialize_count")]
    pub followers_count: u64,
    #[serde(alias = "friends_count", deserialize_with = "deserialize_count")]
    pub following_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub statuses_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub listed_count: u64,
    pub profile_banner_url: Option<String>,
    pub description_urls: Vec<String>,
    pub urls: Vec<String>,
    pub pinned_tweet_ids: Vec<String>,
    pub verified: bool,
    pub possibly_sensitive: bool,
    pub can_dm: bool,
    pub can_media_tag: bool,
    pub want_retweets: bool,
    pub default_profile: bool,
    pub default_profile_image: bool,
    pub has_custom_timelines: bool,
    #[serde(deserialize_with = "deserialize_count")]
    pub fast_followers_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub normal_followers_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub favourites_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub media_count: u64,
    pub is_translator: bool,
    pub translator_type: Option<String>,
    pub profile_interstitial_type: Option<String>,
    pub withheld_in_countries: Vec<String>,
}

/// A single tweet, tagged with the id of the profile it was collected for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tweet {
    #[serde(alias = "id")]
    pub tweet_id: String,
    pub user_id: String,
    #[serde(alias = "full_text")]
    pub text: String,
    #[serde(deserialize_with = "deserialize_x_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_count")]
    pub retweet_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub favorite_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub reply_count: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub quote_count: u64,
    #[serde(deserialize_with = "deserialize_optional_count")]
    pub view_count: Option<u64>,
    pub view_count_state: Option<String>,
    pub lang: Option<String>,
    pub is_quote_status: bool,
    pub possibly_sensitive: bool,
    pub is_edit_eligible: bool,
    pub edits_remaining: Option<u32>,
}

/// Which of a user's two tweet collections a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TweetKind {
    /// Reverse-chronological timeline.
    Recent,
    /// User-curated highlights.
    Highlighted,
}

impl TweetKind {
    /// Label used in logs and operation names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Recent => "tweets",
            Self::Highlighted => "highlight tweets",
        }
    }
}

impl fmt::Display for TweetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One page of a cursor-paginated tweet collection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TweetPage {
    pub tweets: Vec<Tweet>,
    pub next_cursor: Option<String>,
}

/// Everything gathered for one handle.
#[derive(Debug, Clone)]
pub struct CollectedProfile {
    pub profile: UserProfile,
    pub tweets: Vec<Tweet>,
    pub highlight_tweets: Vec<Tweet>,
}

/// Per-handle progress through the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    FetchingProfile,
    FetchingTweets,
    Done,
    Failed,
}

impl HandleState {
    /// Whether moving from `self` to `next` is a legal forward transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::FetchingProfile)
                | (Self::FetchingProfile, Self::FetchingTweets | Self::Failed)
                | (Self::FetchingTweets, Self::Done)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::FetchingProfile => "fetching profile",
            Self::FetchingTweets => "fetching tweets",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A handle that contributed nothing to the result set, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedHandle {
    pub handle: String,
    pub reason: String,
}

/// Accumulated output of a batch run, in handle-processing order.
///
/// Only the three record sequences are serialized; the bookkeeping fields
/// feed the run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub users: Vec<UserProfile>,
    pub tweets: Vec<Tweet>,
    pub highlight_tweets: Vec<Tweet>,
    #[serde(skip)]
    pub processed: usize,
    #[serde(skip)]
    pub skipped: Vec<SkippedHandle>,
    #[serde(skip)]
    pub interrupted: bool,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one handle's records.
    pub fn push(&mut self, collected: CollectedProfile) {
        self.processed += 1;
        self.users.push(collected.profile);
        self.tweets.extend(collected.tweets);
        self.highlight_tweets.extend(collected.highlight_tweets);
    }

    /// Record a handle that was skipped entirely.
    pub fn skip(&mut self, handle: impl Into<String>, reason: impl Into<String>) {
        self.processed += 1;
        self.skipped.push(SkippedHandle {
            handle: handle.into(),
            reason: reason.into(),
        });
    }

    /// Every tweet must belong to a profile present in this set.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.tweets
            .iter()
            .chain(&self.highlight_tweets)
            .all(|t| self.users.iter().any(|u| u.id == t.user_id))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.tweets.is_empty() && self.highlight_tweets.is_empty()
    }
}

/// Parse X's date format: "Fri Jan 09 15:12:21 +0000 2026"
#[must_use]
pub fn parse_x_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(date_str, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(date_str))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn deserialize_x_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_x_date))
}

/// X serializes some counters as strings ("view_count": "1234").
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientCount {
    Number(u64),
    Text(String),
}

impl LenientCount {
    fn value(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_count(deserializer)?.unwrap_or(0))
}

fn deserialize_optional_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<LenientCount> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(LenientCount::value))
}
