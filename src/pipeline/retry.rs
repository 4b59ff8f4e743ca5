//! Bounded retry with exponential backoff for transient client failures.

use log::debug;
use std::thread;
use std::time::{Duration, Instant};

use crate::client::ClientError;
use crate::types::RetryPolicy;
use crate::utils::config::CANCEL_POLL_INTERVAL;

use super::context::ScanShared;

/// Run `call` until it succeeds, fails permanently, or the retry budget is spent.
///
/// Only [`ClientError::is_transient`] failures are retried. A rate-limit `retry_after` hint
/// stretches the backoff when it is longer. Once the scan is asked to stop, no further attempt
/// is made and the backoff wait is cut short; the stop is recorded on `shared` so the result is
/// reported as cancelled. Returns the last result together with the number of attempts made.
pub fn call_with_retry<T, F>(
    policy: &RetryPolicy,
    shared: Option<&ScanShared>,
    what: &str,
    mut call: F,
) -> (Result<T, ClientError>, u32)
where
    F: FnMut() -> Result<T, ClientError>,
{
    let mut attempts = 0_u32;
    loop {
        attempts += 1;
        let result = call();
        let err = match result {
            Ok(v) => return (Ok(v), attempts),
            Err(err) => err,
        };
        let retries_used = attempts - 1;
        if !err.is_transient() || retries_used >= policy.max_retries {
            return (Err(err), attempts);
        }
        if shared.is_some_and(ScanShared::should_stop) {
            debug!("{}: cancelled, not retrying after {}", what, err);
            return (Err(err), attempts);
        }
        let delay = policy.delay_for(retries_used, err.retry_after());
        debug!(
            "{}: {} (attempt {}), retrying in {:?}",
            what, err, attempts, delay
        );
        if !wait_unless_stopped(shared, delay) {
            debug!("{}: cancelled during backoff after {}", what, err);
            return (Err(err), attempts);
        }
    }
}

/// Sleep for `delay`, waking every [`CANCEL_POLL_INTERVAL`] to check for a stop.
/// Returns false if the scan was asked to stop before the delay ran out.
fn wait_unless_stopped(shared: Option<&ScanShared>, delay: Duration) -> bool {
    let Some(shared) = shared else {
        thread::sleep(delay);
        return true;
    };
    let deadline = Instant::now() + delay;
    loop {
        if shared.should_stop() {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(CANCEL_POLL_INTERVAL));
    }
}
