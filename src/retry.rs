// src/retry.rs

//! Bounded retry with exponential backoff
//!
//! Re-invokes a failing operation while its error classifies as
//! retryable (command exited non-zero or timed out). The delay starts at
//! a fixed base and doubles on every subsequent retry. Fatal errors
//! bypass the remaining budget and surface immediately, and the final
//! retryable error is surfaced unchanged once the budget is spent.

use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::observer::BuildObserver;

/// Delay before the first retry; doubles on each one after
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Run `body` with up to `max_attempts` retries on retryable failure.
///
/// `max_attempts` is the retry budget, not the total invocation count:
/// a budget of 2 allows 3 invocations, and a budget of 0 makes the first
/// failure final. Each retry is reported to the observer before the
/// backoff sleep.
pub fn with_retries<T>(
    max_attempts: u32,
    observer: &dyn BuildObserver,
    label: &str,
    body: impl FnMut() -> Result<T>,
) -> Result<T> {
    retry_loop(max_attempts, RETRY_BASE_DELAY, observer, label, body)
}

/// Retry loop with an explicit base delay. Split out so tests can use a
/// short base instead of sleeping for real seconds.
pub(crate) fn retry_loop<T>(
    max_attempts: u32,
    base_delay: Duration,
    observer: &dyn BuildObserver,
    label: &str,
    mut body: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut retries = 0u32;
    loop {
        match body() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retries < max_attempts => {
                retries += 1;
                let delay = base_delay * 2u32.saturating_pow(retries - 1);
                observer.on_retry(label, retries, max_attempts, delay);
                warn!(
                    "{}: retryable failure ({}), retry {}/{} in {:.1}s",
                    label,
                    err,
                    retries,
                    max_attempts,
                    delay.as_secs_f64()
                );
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
