//! Admission control and retry utilities for provider fetches.
//!
//! [`RateLimiter`] bounds how many requests a single provider may start in a
//! sliding time window. [`retry_with_backoff`] retries transient fetch errors
//! (HTTP 429, 5xx, network failures) with exponential backoff.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::FetchError;

/// Sliding-window limiter: at most `max_requests` admissions in any
/// `window`-long interval.
///
/// [`RateLimiter::check_limit`] suspends the caller until a slot is free.
/// Waiters are admitted one at a time because the admission log stays locked
/// while a caller sleeps, so a limiter is meant to be owned by one provider
/// rather than shared as a queue.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `max_requests` is clamped to at least one so the limiter can never
    /// block forever.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
        }
    }

    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until the window has room, then records an admission.
    pub async fn check_limit(&self) {
        let mut admitted = self.admitted.lock().await;

        loop {
            let now = Instant::now();
            while admitted
                .front()
                .is_some_and(|&oldest| now.duration_since(oldest) >= self.window)
            {
                admitted.pop_front();
            }

            if admitted.len() < self.max_requests {
                admitted.push_back(now);
                return;
            }

            let Some(&oldest) = admitted.front() else {
                continue;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            tracing::debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                max_requests = self.max_requests,
                "rate limiter: window full, waiting for oldest request to expire"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of admissions still inside the current window.
    pub async fn in_window(&self) -> usize {
        let admitted = self.admitted.lock().await;
        let now = Instant::now();
        admitted
            .iter()
            .filter(|&&at| now.duration_since(at) < self.window)
            .count()
    }

    /// Forgets every recorded admission.
    pub async fn reset(&self) {
        self.admitted.lock().await.clear();
    }
}

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable: [`FetchError::RateLimited`] (429), [`FetchError::Http`]
/// (connection reset, timeout) and 5xx [`FetchError::UnexpectedStatus`].
/// Everything else is propagated immediately.
fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::RateLimited { .. } | FetchError::Http(_) => true,
        FetchError::UnexpectedStatus { status, .. } => *status >= 500,
        FetchError::NotFound { .. } => false,
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On a retriable error the function sleeps for
/// `backoff_base_secs * 2^attempt` seconds and tries again, up to
/// `max_retries` additional attempts after the first try. If all retries are
/// exhausted the last error is returned. Non-retriable errors are returned
/// immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}
