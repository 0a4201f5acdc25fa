//! Router state

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::cache::Cache;
use crate::domain::DomainError;
use crate::infrastructure::access_key::AccessKeyDirectory;
use crate::infrastructure::auth::JwtValidator;
use crate::infrastructure::transport::TransportHealth;

/// State for the administrative access key API
#[derive(Debug, Clone)]
pub struct DirectoryState {
    pub directory: Arc<AccessKeyDirectory>,
    pub operator_auth: Arc<JwtValidator>,
}

/// A dependency checked by `/ready`
#[async_trait]
pub trait ReadinessProbe: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), DomainError>;
}

#[async_trait]
impl ReadinessProbe for AccessKeyDirectory {
    fn name(&self) -> &'static str {
        "access_key_directory"
    }

    async fn check(&self) -> Result<(), DomainError> {
        self.ping().await
    }
}

/// Probe for a cache the process reads directly
#[derive(Debug, Clone)]
pub struct CacheProbe(pub Arc<dyn Cache>);

#[async_trait]
impl ReadinessProbe for CacheProbe {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn check(&self) -> Result<(), DomainError> {
        self.0.ping().await
    }
}

/// Readiness of a Redis pub/sub subscription
#[derive(Debug, Clone)]
pub struct SubscriptionCheck {
    pub name: &'static str,
    pub health: TransportHealth,
}

impl SubscriptionCheck {
    pub fn new(name: &'static str, health: TransportHealth) -> Self {
        Self { name, health }
    }
}

#[async_trait]
impl ReadinessProbe for SubscriptionCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self) -> Result<(), DomainError> {
        if self.health.is_connected() {
            Ok(())
        } else {
            Err(DomainError::service_unavailable(format!(
                "{} subscription is down",
                self.name
            )))
        }
    }
}

/// Probes evaluated by the readiness endpoint
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_check_fails_while_disconnected() {
        let subscription = SubscriptionCheck::new("redis_replies", TransportHealth::default());

        let err = subscription.check().await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(subscription.name(), "redis_replies");
    }
}
