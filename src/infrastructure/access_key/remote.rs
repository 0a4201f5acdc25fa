//! Directory client used by the gate when the directory runs elsewhere

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::domain::access_key::{AccessKey, AccessKeyResolver};
use crate::domain::DomainError;
use crate::infrastructure::transport::{MessageTransport, TransportError};

/// Message patterns the directory answers
pub mod patterns {
    pub const GET_ACCESS_KEY_DETAILS: &str = "getAccessKeyDetails";
    pub const CHANGE_ACCESS_KEY_STATUS: &str = "changeAccessKeyStatus";

    pub const ALL: &[&str] = &[GET_ACCESS_KEY_DETAILS, CHANGE_ACCESS_KEY_STATUS];
}

/// Request/reply client for the directory's message interface
#[derive(Debug, Clone)]
pub struct RemoteDirectoryClient {
    transport: Arc<dyn MessageTransport>,
    timeout: Duration,
}

impl RemoteDirectoryClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch a key's record; `Ok(None)` when the directory has no such key
    pub async fn get_access_key_details(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        let reply = self
            .send(patterns::GET_ACCESS_KEY_DETAILS, json!({ "key": key }))
            .await?;

        reply.map(decode_access_key).transpose()
    }

    /// Enable or disable a key through the directory
    pub async fn change_access_key_status(
        &self,
        key: &str,
        disabled: bool,
    ) -> Result<AccessKey, DomainError> {
        let reply = self
            .send(
                patterns::CHANGE_ACCESS_KEY_STATUS,
                json!({ "key": key, "disabled": disabled }),
            )
            .await?;

        match reply {
            Some(value) => decode_access_key(value),
            None => Err(DomainError::not_found("Access key not found")),
        }
    }

    /// Send one request, bounded by the client timeout
    ///
    /// Empty replies (`null` or `{}`) come back as `None`.
    async fn send(&self, pattern: &str, data: Value) -> Result<Option<Value>, DomainError> {
        debug!("Sending directory request: pattern={}", pattern);

        let result = tokio::time::timeout(self.timeout, self.transport.send(pattern, data)).await;

        let reply = match result {
            Err(_) => {
                warn!("Directory request timed out: pattern={}", pattern);
                return Err(DomainError::service_unavailable("Request timed out"));
            }
            Ok(Err(TransportError::ConnectionRefused(reason))) => {
                warn!("Directory unreachable: pattern={}, reason={}", pattern, reason);
                return Err(DomainError::service_unavailable("Unable to connect service"));
            }
            Ok(Err(TransportError::Remote { status, message })) => {
                return Err(DomainError::remote(status, message));
            }
            Ok(Err(TransportError::Other(message))) => {
                error!("Directory request failed: pattern={}, error={}", pattern, message);
                return Err(DomainError::internal(format!(
                    "Something went wrong: {}",
                    message
                )));
            }
            Ok(Ok(reply)) => reply,
        };

        Ok(reply.filter(|value| !is_empty_reply(value)))
    }
}

fn is_empty_reply(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn decode_access_key(value: Value) -> Result<AccessKey, DomainError> {
    serde_json::from_value(value)
        .map_err(|e| DomainError::internal(format!("Malformed access key from directory: {}", e)))
}

#[async_trait]
impl AccessKeyResolver for RemoteDirectoryClient {
    async fn find_by_key(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        self.get_access_key_details(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Transport answering every request with a fixed result
    #[derive(Debug)]
    struct FixedTransport {
        reply: Result<Option<Value>, TransportError>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl FixedTransport {
        fn new(reply: Result<Option<Value>, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageTransport for FixedTransport {
        async fn send(&self, pattern: &str, data: Value) -> Result<Option<Value>, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((pattern.to_string(), data));
            self.reply.clone()
        }
    }

    /// Transport that never replies
    #[derive(Debug)]
    struct SilentTransport;

    #[async_trait]
    impl MessageTransport for SilentTransport {
        async fn send(&self, _pattern: &str, _data: Value) -> Result<Option<Value>, TransportError> {
            std::future::pending().await
        }
    }

    fn record_json() -> Value {
        serde_json::to_value(AccessKey::new("k1", "u1").with_rate_limit(10)).unwrap()
    }

    #[tokio::test]
    async fn test_get_details_decodes_record() {
        let transport = FixedTransport::new(Ok(Some(record_json())));
        let client = RemoteDirectoryClient::new(transport.clone());

        let found = client.get_access_key_details("k1").await.unwrap().unwrap();
        assert_eq!(found.key(), "k1");
        assert_eq!(found.rate_limit(), 10);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, "getAccessKeyDetails");
        assert_eq!(requests[0].1, json!({ "key": "k1" }));
    }

    #[tokio::test]
    async fn test_empty_reply_is_absent() {
        for reply in [None, Some(Value::Null), Some(json!({}))] {
            let client = RemoteDirectoryClient::new(FixedTransport::new(Ok(reply)));
            assert!(client.find_by_key("k1").await.unwrap().is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_service_unavailable() {
        let client = RemoteDirectoryClient::new(Arc::new(SilentTransport));

        let err = client.get_access_key_details("k1").await.unwrap_err();

        assert!(matches!(err, DomainError::ServiceUnavailable { .. }));
        assert_eq!(err.message(), "Request timed out");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timeout() {
        let client = RemoteDirectoryClient::new(Arc::new(SilentTransport))
            .with_timeout(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let _ = client.get_access_key_details("k1").await;

        assert!(started.elapsed() < RemoteDirectoryClient::DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_connection_refused_is_service_unavailable() {
        let client = RemoteDirectoryClient::new(FixedTransport::new(Err(
            TransportError::ConnectionRefused("ECONNREFUSED".to_string()),
        )));

        let err = client.get_access_key_details("k1").await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.message(), "Unable to connect service");
    }

    #[tokio::test]
    async fn test_remote_error_passes_through() {
        let client = RemoteDirectoryClient::new(FixedTransport::new(Err(
            TransportError::Remote {
                status: 404,
                message: "Access key not found".to_string(),
            },
        )));

        let err = client.change_access_key_status("k1", true).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "Access key not found");
    }

    #[tokio::test]
    async fn test_other_error_is_internal() {
        let client = RemoteDirectoryClient::new(FixedTransport::new(Err(TransportError::Other(
            "boom".to_string(),
        ))));

        let err = client.get_access_key_details("k1").await.unwrap_err();
        assert!(matches!(err, DomainError::Internal { .. }));
        assert!(err.message().contains("boom"));
    }

    #[tokio::test]
    async fn test_change_status_sends_payload() {
        let updated = serde_json::to_value(AccessKey::new("k1", "u1").with_disabled(true)).unwrap();
        let transport = FixedTransport::new(Ok(Some(updated)));
        let client = RemoteDirectoryClient::new(transport.clone());

        let result = client.change_access_key_status("k1", true).await.unwrap();
        assert!(result.is_disabled());

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, "changeAccessKeyStatus");
        assert_eq!(requests[0].1, json!({ "key": "k1", "disabled": true }));
    }

    #[tokio::test]
    async fn test_malformed_record_is_internal() {
        let client = RemoteDirectoryClient::new(FixedTransport::new(Ok(Some(json!({
            "unexpected": true
        })))));

        let err = client.get_access_key_details("k1").await.unwrap_err();
        assert!(matches!(err, DomainError::Internal { .. }));
    }
}
