//! Collects one handle's profile and tweets.
//!
//! The profile lookup must succeed for the handle to count at all. The two
//! tweet collections are best effort: a collection that cannot be fetched
//! is logged and left empty, and the profile is still kept.

use crate::context::RunContext;
use crate::error::{Result, ScrapeError};
use crate::model::{CollectedProfile, HandleState, Tweet, TweetKind, UserProfile};
use crate::retry::DelayRange;
use tracing::{debug, info, instrument, warn};

pub struct ProfileCollector<'a> {
    ctx: &'a RunContext,
}

impl<'a> ProfileCollector<'a> {
    #[must_use]
    pub const fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Collect everything for `handle`.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Collector` wrapping the profile lookup failure.
    pub async fn collect(&self, handle: &str) -> Result<CollectedProfile> {
        self.collect_with(handle, |_| {}).await
    }

    /// Like [`collect`](Self::collect), reporting each state change to
    /// `on_state`.
    ///
    /// # Errors
    ///
    /// See [`collect`](Self::collect).
    #[instrument(skip(self, on_state))]
    pub async fn collect_with<F>(&self, handle: &str, mut on_state: F) -> Result<CollectedProfile>
    where
        F: FnMut(HandleState) + Send,
    {
        on_state(HandleState::FetchingProfile);
        let profile = match self.fetch_profile(handle).await {
            Ok(profile) => profile,
            Err(e) => {
                on_state(HandleState::Failed);
                return Err(ScrapeError::collector(handle, e));
            }
        };

        on_state(HandleState::FetchingTweets);
        let fetch = &self.ctx.config.fetch;
        let tweets = self
            .collect_or_empty(handle, &profile.id, TweetKind::Recent, fetch.tweet_limit)
            .await;
        let highlight_tweets = self
            .collect_or_empty(
                handle,
                &profile.id,
                TweetKind::Highlighted,
                fetch.highlight_limit,
            )
            .await;

        on_state(HandleState::Done);
        info!(
            handle,
            user_id = %profile.id,
            tweets = tweets.len(),
            highlight_tweets = highlight_tweets.len(),
            "Collected profile"
        );

        Ok(CollectedProfile {
            profile,
            tweets,
            highlight_tweets,
        })
    }

    async fn fetch_profile(&self, handle: &str) -> Result<UserProfile> {
        let ctx = self.ctx;
        let operation = format!("fetch_user(@{handle})");
        let profile = ctx
            .fetch
            .call(&operation, || ctx.api.fetch_user(&ctx.session, handle))
            .await?;

        if profile.id.trim().is_empty() {
            return Err(ScrapeError::with_context(
                operation,
                ScrapeError::invalid_data("profile response has no id"),
            ));
        }
        Ok(profile)
    }

    async fn collect_or_empty(
        &self,
        handle: &str,
        user_id: &str,
        kind: TweetKind,
        limit: usize,
    ) -> Vec<Tweet> {
        match self.fetch_collection(user_id, kind, limit).await {
            Ok(tweets) => tweets,
            Err(e) => {
                warn!(handle, %kind, error = %e, "Could not fetch {kind}, continuing without them");
                Vec::new()
            }
        }
    }

    /// Page through one tweet collection until `limit` tweets are gathered
    /// or the server runs out.
    ///
    /// Each page is its own retried call. Exhausting retries on the first
    /// page fails the collection; on a later page the tweets gathered so
    /// far are kept.
    ///
    /// # Errors
    ///
    /// Returns the first page's fetch error.
    pub async fn fetch_collection(
        &self,
        user_id: &str,
        kind: TweetKind,
        limit: usize,
    ) -> Result<Vec<Tweet>> {
        let ctx = self.ctx;
        let page_size = ctx.config.fetch.page_size.max(1);
        let page_delay = DelayRange::between_pages(&ctx.config.delay);

        let mut tweets: Vec<Tweet> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page = 0_usize;

        while tweets.len() < limit {
            if page > 0 {
                let pause = page_delay.sample(&mut rand::thread_rng());
                ctx.sleeper.sleep(pause).await;
            }
            page += 1;

            let count = (limit - tweets.len()).min(page_size);
            let operation = format!("fetch {kind} for {user_id} (page {page})");
            let result = ctx
                .fetch
                .call(&operation, || {
                    ctx.api
                        .fetch_tweets(&ctx.session, user_id, kind, count, cursor.as_deref())
                })
                .await;

            let batch = match result {
                Ok(batch) => batch,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        user_id,
                        %kind,
                        page,
                        kept = tweets.len(),
                        error = %e,
                        "Pagination stopped early, keeping partial {kind}"
                    );
                    break;
                }
            };

            debug!(user_id, %kind, page, received = batch.tweets.len(), "Fetched page");
            if batch.tweets.is_empty() {
                break;
            }
            tweets.extend(batch.tweets);

            match batch.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tweets.truncate(limit);
        for tweet in &mut tweets {
            tweet.user_id = user_id.to_string();
        }
        Ok(tweets)
    }
}
