//! Deadline and bounded-retry helpers for page acquisition.
//!
//! Scripted page state keeps populating after navigation reports completion,
//! so reads from the page are raced against a timer and retried a bounded
//! number of times, with a corrective action (reload, pause) in between.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FetchError, FetchResult};

/// Bounded retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Deadline applied to each attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }
}

/// Race `op` against a timer.
///
/// `op` receives a child of `cancel`. If the timer wins, the child token is
/// cancelled once, the operation future is dropped, and `Timeout` is returned.
/// If `cancel` fires first the result is `Cancelled`.
pub async fn wait<T, F, Fut>(duration: Duration, cancel: &CancellationToken, op: F) -> FetchResult<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let child = cancel.child_token();
    let fut = op(child.clone());

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = fut => res,
        _ = tokio::time::sleep(duration) => {
            debug!("deadline of {duration:?} expired");
            child.cancel();
            Err(FetchError::Timeout(duration))
        }
    }
}

/// Run `body` until it succeeds or attempts run out.
///
/// `body` receives the 0-based attempt index. A failure that `retryable`
/// accepts, with attempts remaining, runs `corrective` before the next try.
/// Any other failure, or the failure of the last attempt, is returned as is.
pub async fn retry_loop<T, R, B, BFut, H, HFut>(
    max_attempts: u32,
    cancel: &CancellationToken,
    retryable: R,
    mut body: B,
    mut corrective: H,
) -> FetchResult<T>
where
    R: Fn(&FetchError) -> bool,
    B: FnMut(u32) -> BFut,
    BFut: Future<Output = FetchResult<T>>,
    H: FnMut(u32) -> HFut,
    HFut: Future<Output = FetchResult<()>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        match body(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let remaining = attempt + 1 < max_attempts;
                if !remaining || !retryable(&e) {
                    return Err(e);
                }
                info!(
                    "attempt {}/{} failed: {e}; retrying",
                    attempt + 1,
                    max_attempts
                );
                corrective(attempt).await?;
                attempt += 1;
            }
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> FetchResult<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
