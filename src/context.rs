//! Per-run shared state.

use crate::api::ProfileApi;
use crate::config::Config;
use crate::retry::{FetchController, Sleeper};
use crate::session::Session;
use std::sync::Arc;

/// Everything a batch run needs, passed by reference to the collector and
/// driver. Owned by the pipeline for the duration of one run.
pub struct RunContext {
    pub api: Arc<dyn ProfileApi>,
    pub session: Session,
    pub fetch: FetchController,
    pub sleeper: Arc<dyn Sleeper>,
    pub config: Config,
}

impl RunContext {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        session: Session,
        fetch: FetchController,
        sleeper: Arc<dyn Sleeper>,
        config: Config,
    ) -> Self {
        Self {
            api,
            session,
            fetch,
            sleeper,
            config,
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("session_source", &self.session.source())
            .field("fetch", &self.fetch)
            .finish_non_exhaustive()
    }
}
