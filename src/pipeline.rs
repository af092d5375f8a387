//! One complete run: handles, session, batch, output.
//!
//! Configuration and session problems abort before any handle is touched.
//! Once the batch has started, the run always ends by writing whatever was
//! collected, including after an interruption.

use crate::api::ProfileApi;
use crate::batch::BatchDriver;
use crate::config::Config;
use crate::context::RunContext;
use crate::error::Result;
use crate::handles::load_handles;
use crate::model::ResultSet;
use crate::output::{self, OutputPaths};
use crate::retry::{FetchController, RetryPolicy, Sleeper};
use crate::session::{SessionManager, SessionSource};
use indicatif::ProgressBar;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub results: ResultSet,
    pub outputs: OutputPaths,
    pub session_source: SessionSource,
    pub elapsed: Duration,
}

/// Build the [`FetchController`] a run uses for every remote call.
#[must_use]
pub fn fetch_controller(config: &Config, sleeper: Arc<dyn Sleeper>) -> FetchController {
    FetchController::new(RetryPolicy::from_config(&config.retry), sleeper)
}

/// Run the whole pipeline against `api`.
///
/// # Errors
///
/// Returns `ScrapeError::Config` for a missing or empty handle list or
/// unusable credentials, `ScrapeError::Auth` when no session can be
/// established, and IO errors if the outputs cannot be written. Per-handle
/// failures never surface here.
pub async fn execute<S>(
    config: Config,
    api: Arc<dyn ProfileApi>,
    sleeper: Arc<dyn Sleeper>,
    progress: Option<ProgressBar>,
    shutdown: S,
) -> Result<RunReport>
where
    S: Future<Output = ()>,
{
    let start = Instant::now();
    let handles = load_handles(&config.paths.handles)?;

    let fetch = fetch_controller(&config, sleeper.clone());
    let session = SessionManager::new(
        api.clone(),
        fetch.clone(),
        config.paths.cookies.clone(),
        config.credentials.clone(),
    )
    .acquire()
    .await?;
    let session_source = session.source();

    let output_dir = config.paths.output_dir.clone();
    let ctx = RunContext::new(api, session, fetch, sleeper, config);

    let mut driver = BatchDriver::new(&ctx);
    if let Some(bar) = progress {
        driver = driver.with_progress(bar);
    }
    let results = driver.run_until(&handles, shutdown).await;

    let outputs = output::write_all(&results, &output_dir)?;
    info!(
        output_dir = %output_dir.display(),
        interrupted = results.interrupted,
        "Data collection complete"
    );

    Ok(RunReport {
        results,
        outputs,
        session_source,
        elapsed: start.elapsed(),
    })
}
