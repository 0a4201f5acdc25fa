//! Rate limiter implementation
//!
//! Sliding window limiting computed from the audit log on every check. There
//! is no counter state of its own: the count is whatever the log says.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::access_key::AccessKey;
use crate::domain::access_log::AccessLogRepository;
use crate::domain::DomainError;

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Configured limit for the window
    pub limit: u32,
    /// Budget left after the current request, floored at zero
    pub remaining: u32,
    /// Successful checks already inside the window
    pub count: usize,
}

/// Sliding window rate limiter backed by the audit log
#[derive(Debug, Clone)]
pub struct RateLimiter {
    logs: Arc<dyn AccessLogRepository>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with the standard 60 second window
    pub fn new(logs: Arc<dyn AccessLogRepository>) -> Self {
        Self {
            logs,
            window: Duration::seconds(60),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check `access_key` against its limit as of `now`
    ///
    /// Counts successful checks with `now - window <= timestamp <= now`. The
    /// current request is not yet logged, so reaching the limit rejects.
    pub async fn check(
        &self,
        access_key: &AccessKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, DomainError> {
        let from = now - self.window;
        let count = self
            .logs
            .count_successful(access_key.key(), from, now)
            .await?;

        let result = evaluate(access_key.rate_limit(), count);

        debug!(
            "Rate limit check: count={}, limit={}, allowed={}",
            count, result.limit, result.allowed
        );

        Ok(result)
    }
}

fn evaluate(limit: u32, count: usize) -> RateLimitResult {
    let used = u32::try_from(count).unwrap_or(u32::MAX);

    RateLimitResult {
        allowed: used < limit,
        limit,
        remaining: limit.saturating_sub(used).saturating_sub(1),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_log::{AccessLog, MockAccessLogRepository};

    fn successes(key: &str, at: &[DateTime<Utc>]) -> MockAccessLogRepository {
        at.iter().fold(MockAccessLogRepository::new(), |repo, ts| {
            repo.with_log(AccessLog::new(key, *ts).with_success(true))
        })
    }

    #[test]
    fn test_evaluate_boundaries() {
        assert_eq!(
            evaluate(10, 9),
            RateLimitResult {
                allowed: true,
                limit: 10,
                remaining: 0,
                count: 9
            }
        );
        assert!(!evaluate(10, 10).allowed);
        assert_eq!(evaluate(10, 0).remaining, 9);
        assert_eq!(evaluate(10, 25).remaining, 0);
    }

    #[test]
    fn test_zero_limit_always_rejects() {
        let result = evaluate(0, 0);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn test_counts_only_inside_window() {
        let now = Utc::now();
        let logs = successes(
            "k1",
            &[
                now - Duration::seconds(61),
                now - Duration::seconds(60),
                now - Duration::seconds(30),
                now,
            ],
        );
        let limiter = RateLimiter::new(Arc::new(logs));
        let key = AccessKey::new("k1", "u1").with_rate_limit(10);

        let result = limiter.check(&key, now).await.unwrap();

        // Both window bounds are inclusive
        assert_eq!(result.count, 3);
        assert_eq!(result.remaining, 6);
    }

    #[tokio::test]
    async fn test_ignores_failed_checks_and_other_keys() {
        let now = Utc::now();
        let logs = MockAccessLogRepository::new()
            .with_log(AccessLog::new("k1", now).with_success(true))
            .with_log(AccessLog::new("k1", now).with_rate_limited(true))
            .with_log(AccessLog::new("k1", now))
            .with_log(AccessLog::new("k2", now).with_success(true));
        let limiter = RateLimiter::new(Arc::new(logs));

        let result = limiter
            .check(&AccessKey::new("k1", "u1").with_rate_limit(2), now)
            .await
            .unwrap();

        assert_eq!(result.count, 1);
        assert!(result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn test_rejects_at_limit() {
        let now = Utc::now();
        let stamps: Vec<_> = (1..=10).map(|i| now - Duration::seconds(i)).collect();
        let limiter = RateLimiter::new(Arc::new(successes("k1", &stamps)));

        let result = limiter
            .check(&AccessKey::new("k1", "u1").with_rate_limit(10), now)
            .await
            .unwrap();

        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn test_custom_window() {
        let now = Utc::now();
        let logs = successes("k1", &[now - Duration::seconds(5)]);
        let limiter = RateLimiter::new(Arc::new(logs)).with_window(Duration::seconds(2));

        let result = limiter
            .check(&AccessKey::new("k1", "u1").with_rate_limit(1), now)
            .await
            .unwrap();

        assert_eq!(limiter.window(), Duration::seconds(2));
        assert!(result.allowed);
    }
}
