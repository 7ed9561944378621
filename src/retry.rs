//! Retry logic with exponential backoff
//!
//! This module provides configurable retry logic for transient failures.
//! It implements exponential backoff with optional jitter to prevent thundering herd,
//! and stops waiting as soon as the run is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use qmdown::retry::{IsRetryable, download_with_retry};
//! use qmdown::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let result = download_with_retry(&config, &cancel, |_, _, _| {}, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::TransferError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, connection reset) should return `true`.
/// Permanent failures (invalid locator, unwritable destination, disk full) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            // Request timeout, rate limiting and server-side faults may clear up
            TransferError::HttpStatus { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            // Connection reset, timeout, broken body stream
            TransferError::Network(_) => true,
            // Truncated body: the next attempt starts from scratch
            TransferError::SizeMismatch { .. } => true,
            TransferError::InvalidLocator { .. } => false,
            // Unwritable destination or disk full needs user action
            TransferError::Destination { .. } => false,
            TransferError::Cancelled => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (total attempts, delays, backoff multiplier, jitter)
/// * `cancel` - Aborts the backoff wait; the last error is returned immediately
/// * `on_retry` - Called with `(failed_attempt, delay, error)` before each backoff wait
/// * `operation` - Async closure receiving the 1-based attempt number
///
/// # Returns
///
/// Returns the successful result, the first non-retryable error, or the last
/// error once `config.max_attempts` attempts have been made.
pub async fn download_with_retry<F, Fut, T, E, N>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut on_retry: N,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(u32, Duration, &E),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts && !cancel.is_cancelled() => {
                // Calculate jittered delay
                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );
                on_retry(attempt, wait, &e);

                // Wait before retrying, unless the run is being torn down
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::debug!(attempt = attempt, "Retry wait interrupted by cancellation");
                        return Err(e);
                    }
                    () = tokio::time::sleep(wait) => {}
                }

                attempt += 1;
                delay = next_delay(config, delay);
            }
            Err(e) => {
                if e.is_retryable() && attempt >= max_attempts {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else if !e.is_retryable() {
                    tracing::debug!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Delay following `current`, grown by the backoff multiplier and capped at `max_delay`
///
/// A product too large for a `Duration` saturates at `max_delay`.
fn next_delay(config: &RetryConfig, current: Duration) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay.
/// This means the actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
