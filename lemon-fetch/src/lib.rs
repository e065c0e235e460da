pub mod downloader;
pub mod error;
pub mod install;

pub use downloader::Downloader;
pub use error::FetchError;
pub use install::{install_from_github, installed_version};

use std::time::{Duration, Instant};

/// Rate-limits a progress callback to at most once per `MIN_INTERVAL`, so a
/// fast local mirror doesn't spam the caller with a callback per chunk.
///
/// Shared between the GitHub release installer (C1) and the model download
/// pipeline (C9), which both stream chunked HTTP bodies and report progress
/// the same way.
pub struct ProgressRateLimiter {
    last: Option<Instant>,
}

impl ProgressRateLimiter {
    const MIN_INTERVAL: Duration = Duration::from_millis(33);

    pub fn new() -> Self {
        Self { last: None }
    }

    /// Returns true if enough time has elapsed since the last `true` result
    /// to fire the callback again, updating the internal clock as a side effect.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < Self::MIN_INTERVAL => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_first_call_then_throttles() {
        let mut limiter = ProgressRateLimiter::new();
        assert!(limiter.ready());
        assert!(!limiter.ready());
    }

    #[tokio::test]
    async fn rate_limiter_allows_again_after_interval() {
        let mut limiter = ProgressRateLimiter::new();
        assert!(limiter.ready());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.ready());
    }
}
