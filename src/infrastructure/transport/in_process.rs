//! In-process transport over tokio channels
//!
//! Used when both processes run inside one binary, and in tests.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::message::{MessageHandler, MessageTransport, RemoteError, TransportError};

#[derive(Debug)]
struct InProcessRequest {
    pattern: String,
    data: Value,
    reply: oneshot::Sender<Result<Value, RemoteError>>,
}

/// Requesting half of an in-process channel
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    sender: mpsc::Sender<InProcessRequest>,
}

/// Responding half of an in-process channel
#[derive(Debug)]
pub struct InProcessListener {
    receiver: mpsc::Receiver<InProcessRequest>,
}

/// Create a connected transport/listener pair
pub fn in_process_channel(buffer: usize) -> (InProcessTransport, InProcessListener) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    (
        InProcessTransport { sender },
        InProcessListener { receiver },
    )
}

#[async_trait]
impl MessageTransport for InProcessTransport {
    async fn send(&self, pattern: &str, data: Value) -> Result<Option<Value>, TransportError> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(InProcessRequest {
                pattern: pattern.to_string(),
                data,
                reply,
            })
            .await
            .map_err(|_| TransportError::ConnectionRefused("listener is closed".to_string()))?;

        let result = response.await.map_err(|_| {
            TransportError::Other("listener dropped the request without replying".to_string())
        })?;

        match result {
            Ok(value) if value.is_null() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(err.into()),
        }
    }
}

impl InProcessListener {
    /// Dispatch requests to `handler` until `shutdown` resolves or every
    /// transport handle is dropped
    pub async fn serve<F>(mut self, handler: Arc<dyn MessageHandler>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!("In-process listener started: patterns={:?}", handler.patterns());
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                request = self.receiver.recv() => {
                    let Some(request) = request else { break };
                    let handler = handler.clone();

                    tokio::spawn(async move {
                        let result = if handler.patterns().contains(&request.pattern.as_str()) {
                            handler.handle(&request.pattern, request.data).await
                        } else {
                            Err(RemoteError::new(
                                404,
                                format!("There is no matching message handler defined: {}", request.pattern),
                            ))
                        };

                        if request.reply.send(result).is_err() {
                            debug!("Requester went away before reply: pattern={}", request.pattern);
                        }
                    });
                }
            }
        }

        info!("In-process listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        fn patterns(&self) -> &'static [&'static str] {
            &["echo", "nothing", "fail"]
        }

        async fn handle(&self, pattern: &str, data: Value) -> Result<Value, RemoteError> {
            match pattern {
                "echo" => Ok(data),
                "nothing" => Ok(Value::Null),
                _ => Err(RemoteError::new(409, "conflict")),
            }
        }
    }

    fn spawn_echo() -> (InProcessTransport, oneshot::Sender<()>) {
        let (transport, listener) = in_process_channel(8);
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(listener.serve(Arc::new(Echo), async {
            let _ = stopped.await;
        }));
        (transport, stop)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (transport, _stop) = spawn_echo();

        let reply = transport.send("echo", json!({ "a": 1 })).await.unwrap();
        assert_eq!(reply, Some(json!({ "a": 1 })));

        assert_eq!(transport.send("nothing", json!({})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remote_error_passes_through() {
        let (transport, _stop) = spawn_echo();

        let err = transport.send("fail", json!({})).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Remote {
                status: 409,
                message: "conflict".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_pattern() {
        let (transport, _stop) = spawn_echo();

        let err = transport.send("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Remote { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_closed_listener_refuses() {
        let (transport, listener) = in_process_channel(1);
        drop(listener);

        let err = transport.send("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionRefused(_)));
    }
}
