//! Bounded fixed-delay retry for transient fetch failures
//!
//! Only errors for which `FetchError::is_transient` holds are retried. Every
//! other failure is returned after the first attempt.

use crate::crawler::fetcher::FetchError;
use crate::TrawlError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A successful result along with how many attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Retry policy for a single page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` total attempts (at least one)
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` until it succeeds, fails fatally, or attempts run out
    ///
    /// With `k` transient failures before a success, this succeeds iff
    /// `k < max_attempts`. The wait between attempts is abandoned as soon as
    /// `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<Attempted<T>, TrawlError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    })
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        self.delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(TrawlError::Cancelled),
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(TrawlError::Fetch {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
