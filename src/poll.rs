//! Eventual assertions over asynchronously converging cluster state.
//!
//! A poll repeatedly fetches a value until a [`Predicate`] holds, the
//! timeout elapses, or the surrounding run is cancelled. Fetch errors that
//! may resolve on their own (`NotFound`, `Transient`) count as
//! non-matching attempts. `MalformedQuery` ends the poll immediately.
//!
//! ```ignore
//! let message = poll_until(
//!     "policy local-cluster/policy-test.pretend-policy-template",
//!     || query.latest_message(),
//!     &Predicate::matches_regex(".*Mapping not found.*")?,
//!     PollTiming::from_secs(120, 1)?,
//!     &cancel,
//! )
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt, stream};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FetchError, PollError};
use crate::predicate::Predicate;

/* ============================= TIMING ============================= */

/// Maximum wait and delay between attempt starts for one assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    timeout: Duration,
    interval: Duration,
}

impl PollTiming {
    /// Both durations must be positive and `interval <= timeout`.
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, PollError> {
        if timeout.is_zero() {
            return Err(PollError::InvalidTiming("timeout must be positive".to_string()));
        }
        if interval.is_zero() {
            return Err(PollError::InvalidTiming("interval must be positive".to_string()));
        }
        if interval > timeout {
            return Err(PollError::InvalidTiming(format!(
                "interval {interval:?} exceeds timeout {timeout:?}"
            )));
        }
        Ok(Self { timeout, interval })
    }

    pub fn from_secs(timeout_secs: u64, interval_secs: u64) -> Result<Self, PollError> {
        Self::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/* ============================= OBSERVATION ============================= */

/// Last thing a poll saw, kept for the timeout diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Value(String),
    Error(FetchError),
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "value {v}"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/* ============================= POLLING ============================= */

/// Poll `fetch` until `predicate` holds for the fetched value.
///
/// Returns the first satisfying value. See [`poll_stream_until`] for the
/// timing and error contract.
pub async fn poll_until<T, F, Fut>(
    target: &str,
    fetch: F,
    predicate: &Predicate<T>,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    T: fmt::Debug,
{
    let source = stream::repeat_with(fetch).then(|attempt| attempt);
    poll_stream_until(target, source, predicate, timing, cancel).await
}

/// Drive a stream of fetch results until `predicate` holds.
///
/// Each item pulled from `source` is one fetch attempt. Attempt starts are
/// at least `timing.interval()` apart. When an attempt finishes at or past
/// the deadline without a match, the poll fails with [`PollError::Timeout`],
/// so a timeout is reported between `timeout` and `timeout + interval`
/// (plus one fetch latency). Cancellation is observed before every attempt
/// and during the wait between attempts; an in-flight fetch completes first.
pub async fn poll_stream_until<T, S>(
    target: &str,
    source: S,
    predicate: &Predicate<T>,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<T, PollError>
where
    S: Stream<Item = Result<T, FetchError>>,
    T: fmt::Debug,
{
    let mut source = pin!(source);
    let started = Instant::now();
    let deadline = started + timing.timeout;
    let mut attempts: u32 = 0;
    let mut last: Observation;

    debug!(
        resource = %target,
        predicate = predicate.description(),
        timeout_ms = timing.timeout.as_millis() as u64,
        interval_ms = timing.interval.as_millis() as u64,
        "poll_start"
    );

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(target, predicate, attempts));
        }

        attempts += 1;
        let attempt_started = Instant::now();

        match source.next().await {
            Some(Ok(value)) => {
                if predicate.holds(&value) {
                    info!(
                        resource = %target,
                        predicate = predicate.description(),
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "poll_satisfied"
                    );
                    return Ok(value);
                }
                debug!(resource = %target, attempts, value = ?value, "poll_value_rejected");
                last = Observation::Value(format!("{value:?}"));
            }
            Some(Err(err)) if !err.is_retryable() => {
                warn!(resource = %target, error = %err, "poll_malformed_query");
                return Err(PollError::MalformedQuery {
                    target: target.to_string(),
                    reason: err.to_string(),
                });
            }
            Some(Err(err)) => {
                debug!(resource = %target, attempts, error = %err, "poll_fetch_failed");
                last = Observation::Error(err);
            }
            None => {
                return Err(PollError::MalformedQuery {
                    target: target.to_string(),
                    reason: "status source ended".to_string(),
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed = now - started;
            warn!(
                resource = %target,
                predicate = predicate.description(),
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                last_observed = %last,
                "poll_timed_out"
            );
            return Err(PollError::Timeout {
                target: target.to_string(),
                predicate: predicate.description().to_string(),
                elapsed,
                attempts,
                last_observed: last.to_string(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(cancelled(target, predicate, attempts));
            }
            _ = sleep_until(attempt_started + timing.interval) => {}
        }
    }
}

fn cancelled<T>(target: &str, predicate: &Predicate<T>, attempts: u32) -> PollError {
    info!(resource = %target, attempts, "poll_cancelled");
    PollError::Cancelled {
        target: target.to_string(),
        predicate: predicate.description().to_string(),
        attempts,
    }
}

/* ============================= TESTS ============================= */
