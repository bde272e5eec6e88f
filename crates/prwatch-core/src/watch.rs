//! The watch loop: baseline snapshot, polling, debounce, deadline, and cancellation.
//!
//! When several events are ready in the same wakeup the loop resolves them in a
//! fixed order: deadline, cancellation, debounce expiry, poll tick.

use std::pin::Pin;
use std::time::Duration;

use prwatch_github::PullRequestRef;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, Sleep};

use crate::cancellation::CancellationTrigger;
use crate::comment::{Comment, WatchResult};
use crate::diff_tracker::ObservedSet;
use crate::source::{CommentSource, FetchError};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3_600);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Timing and scope for one watch run.
pub struct WatchOptions {
    pub interval: Duration,
    pub debounce: Duration,
    pub timeout: Duration,
    /// Also watch general (non-review) conversation comments.
    pub include_general: bool,
    /// Back-to-back poll failures tolerated before the watch aborts.
    pub max_consecutive_failures: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
            timeout: DEFAULT_TIMEOUT,
            include_general: true,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl WatchOptions {
    pub fn validate(&self) -> Result<(), WatchError> {
        for (name, value) in [
            ("interval", self.interval),
            ("debounce", self.debounce),
            ("timeout", self.timeout),
        ] {
            if value.is_zero() {
                return Err(WatchError::InvalidOptions(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.max_consecutive_failures == 0 {
            return Err(WatchError::InvalidOptions(
                "max consecutive failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
/// Fatal watch failures. Non-error stops are reported through [`WatchResult`].
pub enum WatchError {
    #[error("invalid watch options: {0}")]
    InvalidOptions(String),
    #[error("fetch initial comments")]
    InitialFetch(#[source] FetchError),
    #[error("polling failed after {consecutive_failures} consecutive errors")]
    PollingFailed {
        consecutive_failures: usize,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Quiet,
    TimedOut,
    Cancelled,
}

/// Block until new discussion activity settles, the deadline passes, or `cancellation` fires.
///
/// Comments present at the first fetch are the baseline and are never reported.
/// Only the first fetch is fatal on failure; later failures are tolerated up to
/// `max_consecutive_failures` in a row.
pub async fn watch<S>(
    source: &S,
    target: &PullRequestRef,
    options: &WatchOptions,
    mut cancellation: CancellationTrigger,
) -> Result<WatchResult, WatchError>
where
    S: CommentSource + ?Sized,
{
    options.validate()?;
    let started = Instant::now();
    let deadline = tokio::time::sleep_until(started + options.timeout);
    tokio::pin!(deadline);

    let baseline = source
        .fetch_all(target, options.include_general)
        .await
        .map_err(WatchError::InitialFetch)?;
    let mut observed = ObservedSet::seeded(&baseline);
    tracing::info!(
        pull_request = %target,
        baseline = baseline.len(),
        interval_ms = options.interval.as_millis() as u64,
        debounce_ms = options.debounce.as_millis() as u64,
        timeout_ms = options.timeout.as_millis() as u64,
        "watch started"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + options.interval, options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut debounce: Option<Pin<Box<Sleep>>> = None;
    let mut accumulated: Vec<Comment> = Vec::new();
    let mut consecutive_failures = 0_usize;

    let reason = loop {
        tokio::select! {
            biased;
            _ = &mut deadline => break StopReason::TimedOut,
            _ = cancellation.cancelled() => break StopReason::Cancelled,
            _ = wait_debounce(&mut debounce), if debounce.is_some() => break StopReason::Quiet,
            _ = ticker.tick() => {
                let fetched = source.fetch_all(target, options.include_general).await;
                // The fetch cannot be interrupted; drop its result if a stop won meanwhile.
                if deadline.is_elapsed() || cancellation.is_cancelled() {
                    tracing::debug!(pull_request = %target, "discarding poll that finished after stop");
                    continue;
                }
                match fetched {
                    Ok(comments) => {
                        consecutive_failures = 0;
                        let new_comments = observed.diff(comments);
                        if new_comments.is_empty() {
                            tracing::debug!(pull_request = %target, "poll found no new comments");
                            continue;
                        }
                        tracing::debug!(
                            pull_request = %target,
                            new = new_comments.len(),
                            pending = accumulated.len() + new_comments.len(),
                            "new comments observed; restarting debounce"
                        );
                        accumulated.extend(new_comments);
                        // Replace rather than extend so a stale expiry can never fire.
                        debounce = Some(Box::pin(tokio::time::sleep(options.debounce)));
                    }
                    Err(error) => {
                        consecutive_failures += 1;
                        if consecutive_failures >= options.max_consecutive_failures {
                            return Err(WatchError::PollingFailed {
                                consecutive_failures,
                                source: error,
                            });
                        }
                        tracing::warn!(
                            pull_request = %target,
                            consecutive_failures,
                            error = %display_chain(&error),
                            "poll failed; will retry on next tick"
                        );
                    }
                }
            }
        }
    };

    let result = WatchResult {
        comments: accumulated,
        timed_out: reason == StopReason::TimedOut,
        cancelled: reason == StopReason::Cancelled,
        watched_ms: started.elapsed().as_millis() as u64,
    };
    tracing::info!(
        pull_request = %target,
        reason = ?reason,
        comments = result.comments.len(),
        watched_ms = result.watched_ms,
        "watch finished"
    );
    Ok(result)
}

fn display_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

async fn wait_debounce(debounce: &mut Option<Pin<Box<Sleep>>>) {
    match debounce.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
