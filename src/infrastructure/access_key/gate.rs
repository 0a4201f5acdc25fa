//! Access gate
//!
//! Request-time validation of a presented access key. Once a key resolves,
//! exactly one audit record is appended for the check, on every exit path,
//! before the outcome is handed back to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::domain::access_key::{AccessKey, AccessKeyResolver};
use crate::domain::access_log::{AccessLog, AccessLogRepository};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_access_check;

use super::rate_limiter::{RateLimitResult, RateLimiter};

/// How a single check ended, used for metrics and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Missing,
    Invalid,
    Disabled,
    Expired,
    RateLimited,
    Allowed,
    Failed,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Disabled => "disabled",
            Self::Expired => "expired",
            Self::RateLimited => "rate_limited",
            Self::Allowed => "allowed",
            Self::Failed => "failed",
        }
    }
}

/// A passed check: the resolved key plus its rate limit budget
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_key: AccessKey,
    pub rate_limit: RateLimitResult,
}

/// A rejected check
///
/// `rate_limit` is present whenever the limiter ran, so callers can report
/// budget headers on a 429 as well as on success.
#[derive(Debug, Clone)]
pub struct AccessDenial {
    pub outcome: GateOutcome,
    pub error: DomainError,
    pub key: Option<String>,
    pub rate_limit: Option<RateLimitResult>,
}

impl AccessDenial {
    fn new(outcome: GateOutcome, error: DomainError) -> Self {
        Self {
            outcome,
            error,
            key: None,
            rate_limit: None,
        }
    }

    fn unauthorized(outcome: GateOutcome, message: &str) -> Self {
        Self::new(outcome, DomainError::unauthorized(message))
    }

    fn with_rate_limit(mut self, key: &AccessKey, rate_limit: RateLimitResult) -> Self {
        self.key = Some(key.key().to_string());
        self.rate_limit = Some(rate_limit);
        self
    }
}

/// Collaborator errors: the check could not be decided
impl From<DomainError> for AccessDenial {
    fn from(error: DomainError) -> Self {
        Self::new(GateOutcome::Failed, error)
    }
}

/// Guarantees one audit append per resolved check
///
/// Enter with a stub, mutate it while evaluating, then hand the evaluation
/// result to [`AuditScope::finish`], which appends before returning it.
struct AuditScope<'a> {
    logs: &'a dyn AccessLogRepository,
    record: AccessLog,
}

impl<'a> AuditScope<'a> {
    fn enter(logs: &'a dyn AccessLogRepository, key: &str, now: DateTime<Utc>) -> Self {
        Self {
            logs,
            record: AccessLog::new(key, now),
        }
    }

    fn record(&mut self) -> &mut AccessLog {
        &mut self.record
    }

    /// Append the record, then release `outcome`
    ///
    /// A failed append overrides any outcome with an internal error: a lost
    /// record would let later checks undercount the window.
    async fn finish<T>(self, outcome: Result<T, AccessDenial>) -> Result<T, AccessDenial> {
        let id = self.record.id().clone();

        if let Err(e) = self.logs.append(self.record).await {
            error!("Failed to append access log {}: {}", id, e);
            return Err(DomainError::internal("Failed to record access check").into());
        }

        outcome
    }
}

/// Validates presented access keys and enforces their rate limits
#[derive(Debug, Clone)]
pub struct AccessGate {
    resolver: Arc<dyn AccessKeyResolver>,
    rate_limiter: RateLimiter,
    logs: Arc<dyn AccessLogRepository>,
}

impl AccessGate {
    pub fn new(
        resolver: Arc<dyn AccessKeyResolver>,
        rate_limiter: RateLimiter,
        logs: Arc<dyn AccessLogRepository>,
    ) -> Self {
        Self {
            resolver,
            rate_limiter,
            logs,
        }
    }

    /// Check the key presented by a caller, if any
    pub async fn check(&self, presented: Option<&str>) -> Result<AccessGrant, AccessDenial> {
        self.check_at(presented, Utc::now()).await
    }

    /// Check as of `now`
    pub async fn check_at(
        &self,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessDenial> {
        let result = self.run(presented, now).await;

        let outcome = match &result {
            Ok(_) => GateOutcome::Allowed,
            Err(denial) => denial.outcome,
        };
        record_access_check(outcome.as_str());
        debug!("Access check finished: outcome={}", outcome.as_str());

        result
    }

    async fn run(
        &self,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessDenial> {
        let Some(presented) = presented.filter(|k| !k.is_empty()) else {
            return Err(AccessDenial::unauthorized(GateOutcome::Missing, "Unauthorized"));
        };

        let Some(access_key) = self.resolver.find_by_key(presented).await? else {
            return Err(AccessDenial::unauthorized(
                GateOutcome::Invalid,
                "Invalid access key",
            ));
        };

        let mut scope = AuditScope::enter(self.logs.as_ref(), access_key.key(), now);
        let outcome = self.evaluate(scope.record(), &access_key, now).await;
        scope.finish(outcome).await
    }

    /// Disabled, then expired, then rate limited; first match wins
    async fn evaluate(
        &self,
        record: &mut AccessLog,
        access_key: &AccessKey,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessDenial> {
        record.mark_rejected();

        if access_key.is_disabled() {
            return Err(AccessDenial::unauthorized(
                GateOutcome::Disabled,
                "Access key disabled",
            ));
        }

        if access_key.is_expired_at(now) {
            return Err(AccessDenial::unauthorized(
                GateOutcome::Expired,
                "Access key expired",
            ));
        }

        let rate_limit = self.rate_limiter.check(access_key, now).await?;

        if !rate_limit.allowed {
            record.mark_rate_limited();
            warn!(
                "Rate limit exceeded: limit={}, count={}",
                rate_limit.limit, rate_limit.count
            );
            return Err(AccessDenial::new(
                GateOutcome::RateLimited,
                DomainError::too_many_requests("Rate limit exceeded"),
            )
            .with_rate_limit(access_key, rate_limit));
        }

        record.mark_success();

        Ok(AccessGrant {
            access_key: access_key.clone(),
            rate_limit,
        })
    }
}
