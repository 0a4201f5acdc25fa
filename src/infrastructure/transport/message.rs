//! Transport traits and wire envelopes

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures observed by the requesting side of a transport
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The broker or the responder could not be reached
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// The responder answered with a structured error
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Interpret the `err` field of a reply
    ///
    /// Objects carrying a numeric `statusCode` become [`TransportError::Remote`];
    /// anything else is opaque.
    pub fn from_reply(err: &Value) -> Self {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| err.as_str().map(String::from))
            .unwrap_or_else(|| err.to_string());

        match err
            .get("statusCode")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
        {
            Some(status) => Self::Remote { status, message },
            None => Self::Other(message),
        }
    }
}

/// Structured error a responder sends back, `{ statusCode, message }` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    pub status_code: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl From<RemoteError> for TransportError {
    fn from(err: RemoteError) -> Self {
        Self::Remote {
            status: err.status_code,
            message: err.message,
        }
    }
}

/// Request published on the pattern channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
}

/// Reply published on `<pattern>.reply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,
    #[serde(default)]
    pub is_disposed: bool,
}

impl ReplyEnvelope {
    pub fn from_result(id: impl Into<String>, result: Result<Value, RemoteError>) -> Self {
        let id = id.into();
        match result {
            Ok(response) => Self {
                id,
                response: Some(response),
                err: None,
                is_disposed: true,
            },
            Err(err) => Self {
                id,
                response: None,
                err: serde_json::to_value(err).ok(),
                is_disposed: true,
            },
        }
    }

    /// Collapse into the requester's view; a missing or null response is `None`
    pub fn into_result(self) -> Result<Option<Value>, TransportError> {
        if let Some(err) = self.err.filter(|e| !e.is_null()) {
            return Err(TransportError::from_reply(&err));
        }

        Ok(self.response.filter(|r| !r.is_null()))
    }
}

/// Channel name replies for `pattern` are published on
pub fn reply_channel(pattern: &str) -> String {
    format!("{}.reply", pattern)
}

/// Requesting side: send one message and await exactly one reply
///
/// Implementations do not time out on their own; callers bound the wait.
#[async_trait]
pub trait MessageTransport: Send + Sync + Debug {
    async fn send(&self, pattern: &str, data: Value) -> Result<Option<Value>, TransportError>;
}

/// Responding side: handles requests for a fixed set of patterns
#[async_trait]
pub trait MessageHandler: Send + Sync + Debug {
    /// Patterns this handler answers
    fn patterns(&self) -> &'static [&'static str];

    async fn handle(&self, pattern: &str, data: Value) -> Result<Value, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_with_status_code_is_remote() {
        let err = TransportError::from_reply(&json!({
            "statusCode": 404,
            "message": "Access key not found"
        }));

        assert_eq!(
            err,
            TransportError::Remote {
                status: 404,
                message: "Access key not found".to_string()
            }
        );
    }

    #[test]
    fn test_reply_without_status_code_is_opaque() {
        assert_eq!(
            TransportError::from_reply(&json!("boom")),
            TransportError::Other("boom".to_string())
        );
        assert_eq!(
            TransportError::from_reply(&json!({ "message": "boom" })),
            TransportError::Other("boom".to_string())
        );
    }

    #[test]
    fn test_reply_envelope_wire_shape() {
        let reply = ReplyEnvelope::from_result("1", Err(RemoteError::new(404, "gone")));
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json["id"], "1");
        assert_eq!(json["err"]["statusCode"], 404);
        assert_eq!(json["isDisposed"], true);
        assert!(json.get("response").is_none());
    }

    #[test]
    fn test_null_response_means_absent() {
        let reply = ReplyEnvelope::from_result("1", Ok(Value::Null));
        assert_eq!(reply.into_result().unwrap(), None);

        let reply: ReplyEnvelope =
            serde_json::from_str(r#"{"id":"1","isDisposed":true}"#).unwrap();
        assert_eq!(reply.into_result().unwrap(), None);
    }

    #[test]
    fn test_reply_channel() {
        assert_eq!(reply_channel("getAccessKeyDetails"), "getAccessKeyDetails.reply");
    }
}
