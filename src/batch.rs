//! Sequential batch over the handle list.
//!
//! Handles are processed strictly one at a time, in input order, with a
//! randomized pause between consecutive handles. A failed handle is logged
//! and skipped; it never stops the batch. A shutdown future lets the caller
//! stop early while keeping what was already collected.

use crate::collector::ProfileCollector;
use crate::context::RunContext;
use crate::log_progress;
use crate::model::{HandleState, ResultSet};
use crate::retry::DelayRange;
use indicatif::ProgressBar;
use std::future::Future;
use tracing::{debug, info, warn};

pub struct BatchDriver<'a> {
    ctx: &'a RunContext,
    progress: Option<ProgressBar>,
}

impl<'a> BatchDriver<'a> {
    #[must_use]
    pub const fn new(ctx: &'a RunContext) -> Self {
        Self {
            ctx,
            progress: None,
        }
    }

    /// Report progress on `bar`, one tick per handle.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Process every handle.
    pub async fn run(&self, handles: &[String]) -> ResultSet {
        self.run_until(handles, std::future::pending::<()>()).await
    }

    /// Process handles until done or until `shutdown` resolves.
    ///
    /// On shutdown the handle in flight is abandoned and the returned set is
    /// marked `interrupted`.
    pub async fn run_until<S>(&self, handles: &[String], shutdown: S) -> ResultSet
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut results = ResultSet::new();
        let total = handles.len();
        let handle_delay = DelayRange::between_handles(&self.ctx.config.delay);

        if let Some(bar) = &self.progress {
            bar.set_length(total as u64);
        }

        for (index, handle) in handles.iter().enumerate() {
            if index > 0 {
                let pause = handle_delay.sample(&mut rand::thread_rng());
                debug!(delay_secs = pause.as_secs_f64(), "Pausing before next handle");
                let stopped = tokio::select! {
                    biased;
                    () = &mut shutdown => true,
                    () = self.ctx.sleeper.sleep(pause) => false,
                };
                if stopped {
                    results.interrupted = true;
                    break;
                }
            }

            if let Some(bar) = &self.progress {
                bar.set_message(format!("@{handle}"));
            }

            let stopped = tokio::select! {
                biased;
                () = &mut shutdown => true,
                () = self.process(handle, &mut results) => false,
            };
            if stopped {
                warn!(handle = %handle, "Interrupted, abandoning handle in flight");
                results.interrupted = true;
                break;
            }

            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
            log_progress!(index + 1, total, "Processed handle");
        }

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        info!(
            processed = results.processed,
            users = results.users.len(),
            tweets = results.tweets.len(),
            highlight_tweets = results.highlight_tweets.len(),
            skipped = results.skipped.len(),
            interrupted = results.interrupted,
            "Batch finished"
        );
        results
    }

    async fn process(&self, handle: &str, results: &mut ResultSet) {
        info!(handle, "Fetching data for user");

        let mut state = HandleState::Pending;
        let outcome = ProfileCollector::new(self.ctx)
            .collect_with(handle, |next| {
                debug_assert!(
                    state.can_transition_to(next),
                    "illegal transition {state} -> {next}"
                );
                debug!(handle, from = %state, to = %next, "Handle state changed");
                state = next;
            })
            .await;
        debug_assert!(state.is_terminal(), "handle left in state {state}");

        match outcome {
            Ok(collected) => results.push(collected),
            Err(e) => {
                warn!(handle, error = %e, "Skipping handle");
                let reason = std::error::Error::source(&e)
                    .map_or_else(|| e.to_string(), ToString::to_string);
                results.skip(handle, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProfileApi;
    use crate::config::{Config, Credentials};
    use crate::model::{Tweet, TweetKind, TweetPage, UserProfile};
    use crate::retry::{FetchController, FetchOutcome, RecordingSleeper, RetryPolicy};
    use crate::session::{CookieJar, Session, SessionSource};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Knows only the handles in `known`; every other lookup fails.
    struct DirectoryApi {
        known: Vec<&'static str>,
    }

    #[async_trait]
    impl ProfileApi for DirectoryApi {
        async fn login(&self, _: &Credentials) -> FetchOutcome<CookieJar> {
            FetchOutcome::Failure("unused".into())
        }

        async fn verify_session(&self, _: &Session) -> FetchOutcome<()> {
            FetchOutcome::Success(())
        }

        async fn fetch_user(&self, _: &Session, handle: &str) -> FetchOutcome<UserProfile> {
            match self.known.iter().position(|k| *k == handle) {
                Some(i) => FetchOutcome::Success(UserProfile {
                    id: format!("{}", i + 1),
                    screen_name: handle.into(),
                    ..UserProfile::default()
                }),
                None => FetchOutcome::Failure("HTTP 404: User not found".into()),
            }
        }

        async fn fetch_tweets(
            &self,
            _: &Session,
            user_id: &str,
            kind: TweetKind,
            _count: usize,
            _cursor: Option<&str>,
        ) -> FetchOutcome<TweetPage> {
            let prefix = if kind == TweetKind::Recent { "t" } else { "h" };
            FetchOutcome::Success(TweetPage {
                tweets: vec![Tweet {
                    tweet_id: format!("{prefix}{user_id}"),
                    ..Tweet::default()
                }],
                next_cursor: None,
            })
        }
    }

    fn context(known: Vec<&'static str>) -> (RunContext, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut config = Config::default();
        config.delay.min_secs = 15.0;
        config.delay.max_secs = 30.0;
        let fetch = FetchController::new(
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(1),
            },
            sleeper.clone(),
        );
        let ctx = RunContext::new(
            Arc::new(DirectoryApi { known }),
            Session::new(CookieJar::new(), SessionSource::Stored),
            fetch,
            sleeper.clone(),
            config,
        );
        (ctx, sleeper)
    }

    fn handles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn failed_handle_is_skipped_and_batch_continues() {
        let (ctx, _) = context(vec!["alice", "carol"]);
        let results = BatchDriver::new(&ctx)
            .run(&handles(&["alice", "ghost", "carol"]))
            .await;

        let names: Vec<&str> = results.users.iter().map(|u| u.screen_name.as_str()).collect();
        assert_eq!(names, ["alice", "carol"]);
        assert_eq!(results.tweets.len(), 2);
        assert_eq!(results.highlight_tweets.len(), 2);
        assert_eq!(results.processed, 3);
        assert_eq!(results.skipped.len(), 1);
        assert_eq!(results.skipped[0].handle, "ghost");
        assert!(results.skipped[0].reason.contains("404"));
        assert!(results.is_consistent());
        assert!(!results.interrupted);
    }

    #[tokio::test]
    async fn pauses_only_between_handles() {
        let (ctx, sleeper) = context(vec!["a", "b", "c"]);
        BatchDriver::new(&ctx).run(&handles(&["a", "b", "c"])).await;

        let waits = sleeper.waits();
        assert_eq!(waits.len(), 2);
        for w in waits {
            assert!(w >= Duration::from_secs(15) && w <= Duration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn shutdown_before_start_yields_empty_interrupted_set() {
        let (ctx, _) = context(vec!["alice"]);
        let results = BatchDriver::new(&ctx)
            .run_until(&handles(&["alice"]), std::future::ready(()))
            .await;
        assert!(results.is_empty());
        assert!(results.interrupted);
    }

    #[tokio::test]
    async fn empty_handle_list_is_a_no_op() {
        let (ctx, sleeper) = context(vec![]);
        let results = BatchDriver::new(&ctx).run(&[]).await;
        assert!(results.is_empty());
        assert_eq!(results.processed, 0);
        assert!(sleeper.waits().is_empty());
    }
}
