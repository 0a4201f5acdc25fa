//! Directory side of the message interface

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::access_key::validate_status_change;
use crate::domain::DomainError;
use crate::infrastructure::transport::{MessageHandler, RemoteError};

use super::directory::AccessKeyDirectory;
use super::remote::patterns;

/// Answers `getAccessKeyDetails` and `changeAccessKeyStatus` from the directory
#[derive(Debug, Clone)]
pub struct DirectoryResponder {
    directory: Arc<AccessKeyDirectory>,
}

impl DirectoryResponder {
    pub fn new(directory: Arc<AccessKeyDirectory>) -> Self {
        Self { directory }
    }

    async fn get_access_key_details(&self, data: &Value) -> Result<Value, RemoteError> {
        let Some(key) = data.get("key").and_then(Value::as_str) else {
            return Err(RemoteError::new(400, "key: must be a string"));
        };

        let found = self.directory.find_by_key(key).await.map_err(to_remote)?;
        debug!("Access key details requested: found={}", found.is_some());

        to_value(found)
    }

    async fn change_access_key_status(&self, data: &Value) -> Result<Value, RemoteError> {
        let change = validate_status_change(data).map_err(|e| RemoteError::new(400, e.to_string()))?;

        let updated = self
            .directory
            .change_status(&change.key, change.disabled)
            .await
            .map_err(to_remote)?;

        info!(
            "Access key status changed over message channel: disabled={}",
            updated.is_disabled()
        );

        to_value(updated)
    }
}

fn to_remote(err: DomainError) -> RemoteError {
    RemoteError::new(err.status_code(), err.message())
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RemoteError> {
    serde_json::to_value(value)
        .map_err(|e| RemoteError::new(500, format!("Failed to encode reply: {}", e)))
}

#[async_trait]
impl MessageHandler for DirectoryResponder {
    fn patterns(&self) -> &'static [&'static str] {
        patterns::ALL
    }

    async fn handle(&self, pattern: &str, data: Value) -> Result<Value, RemoteError> {
        match pattern {
            patterns::GET_ACCESS_KEY_DETAILS => self.get_access_key_details(&data).await,
            patterns::CHANGE_ACCESS_KEY_STATUS => self.change_access_key_status(&data).await,
            other => Err(RemoteError::new(
                404,
                format!("There is no matching message handler defined: {}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_key::{AccessKey, MockAccessKeyRepository};
    use crate::domain::cache::MockCache;
    use crate::domain::user::User;
    use crate::infrastructure::access_key::RemoteDirectoryClient;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::transport::in_process_channel;
    use crate::infrastructure::user::StorageUserRepository;
    use serde_json::json;

    async fn responder_with(keys: Vec<AccessKey>) -> DirectoryResponder {
        let mut repository = MockAccessKeyRepository::new();
        for key in keys {
            repository = repository.with_key(key).await;
        }

        let directory = AccessKeyDirectory::new(
            Arc::new(repository),
            Arc::new(StorageUserRepository::new(Arc::new(
                InMemoryStorage::<User>::new(),
            ))),
            Arc::new(MockCache::new()),
        );

        DirectoryResponder::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_details_for_known_key() {
        let responder = responder_with(vec![AccessKey::new("k1", "u1").with_rate_limit(5)]).await;

        let reply = responder
            .handle("getAccessKeyDetails", json!({ "key": "k1" }))
            .await
            .unwrap();

        assert_eq!(reply["key"], "k1");
        assert_eq!(reply["rateLimit"], 5);
    }

    #[tokio::test]
    async fn test_details_for_unknown_key_is_null() {
        let responder = responder_with(vec![]).await;

        let reply = responder
            .handle("getAccessKeyDetails", json!({ "key": "nope" }))
            .await
            .unwrap();

        assert!(reply.is_null());
    }

    #[tokio::test]
    async fn test_change_status() {
        let responder = responder_with(vec![AccessKey::new("k1", "u1")]).await;

        let reply = responder
            .handle("changeAccessKeyStatus", json!({ "key": "k1", "disabled": true }))
            .await
            .unwrap();

        assert_eq!(reply["disabled"], true);
    }

    #[tokio::test]
    async fn test_change_status_unknown_key() {
        let responder = responder_with(vec![]).await;

        let err = responder
            .handle("changeAccessKeyStatus", json!({ "key": "nope", "disabled": true }))
            .await
            .unwrap_err();

        assert_eq!(err, RemoteError::new(404, "Access key not found"));
    }

    #[tokio::test]
    async fn test_change_status_rejects_bad_payload() {
        let responder = responder_with(vec![]).await;

        let err = responder
            .handle("changeAccessKeyStatus", json!({ "key": "k1" }))
            .await
            .unwrap_err();

        assert_eq!(err.status_code, 400);
        assert!(err.message.contains("disabled"));
    }

    #[tokio::test]
    async fn test_client_and_responder_over_channel() {
        let responder = responder_with(vec![AccessKey::new("k1", "u1")]).await;
        let (transport, listener) = in_process_channel(8);
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(listener.serve(Arc::new(responder), async {
            let _ = stopped.await;
        }));

        let client = RemoteDirectoryClient::new(Arc::new(transport));

        let found = client.get_access_key_details("k1").await.unwrap();
        assert_eq!(found.map(|k| k.user_id().to_string()), Some("u1".to_string()));
        assert!(client.get_access_key_details("nope").await.unwrap().is_none());

        let disabled = client.change_access_key_status("k1", true).await.unwrap();
        assert!(disabled.is_disabled());

        let err = client.change_access_key_status("nope", true).await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let _ = stop.send(());
    }
}
