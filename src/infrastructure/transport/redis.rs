//! Redis pub/sub transport
//!
//! Requests are published as `{ id, pattern, data }` on a channel named after
//! the pattern. The responder publishes `{ id, response | err, isDisposed }` on
//! `<pattern>.reply`, and the requester correlates by `id`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, RedisError};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::message::{
    reply_channel, MessageHandler, MessageTransport, ReplyEnvelope, RequestEnvelope,
    TransportError,
};

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<ReplyEnvelope>>>>;

/// Redis transport configuration
#[derive(Debug, Clone)]
pub struct RedisTransportConfig {
    pub url: String,
    pub connection_timeout: Duration,
}

impl Default for RedisTransportConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    fn client(&self) -> Result<Client, TransportError> {
        Client::open(self.url.as_str())
            .map_err(|e| TransportError::Other(format!("Invalid Redis URL: {}", e)))
    }

    async fn publisher(&self, client: &Client) -> Result<ConnectionManager, TransportError> {
        tokio::time::timeout(self.connection_timeout, ConnectionManager::new(client.clone()))
            .await
            .map_err(|_| TransportError::ConnectionRefused("Redis connection timed out".to_string()))?
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: RedisError) -> TransportError {
    if err.is_connection_refusal() || err.is_io_error() {
        TransportError::ConnectionRefused(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Whether a transport's subscription is currently live
///
/// Cloned into readiness checks; flips to false as soon as the pub/sub stream
/// ends and back once a resubscription succeeds.
#[derive(Debug, Clone, Default)]
pub struct TransportHealth {
    connected: Arc<AtomicBool>,
}

impl TransportHealth {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

/// Exponential resubscribe delay: 100ms doubling up to 5s
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            current: Duration::from_millis(100),
        }
    }
}

impl Backoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Removes a pending entry when the awaiting request is dropped
struct PendingGuard {
    pending: PendingReplies,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

/// Drop every waiting sender so its request fails instead of hanging
fn fail_pending(pending: &PendingReplies) -> usize {
    pending
        .lock()
        .map(|mut pending| pending.drain().count())
        .unwrap_or(0)
}

async fn await_reply(reply: oneshot::Receiver<ReplyEnvelope>) -> Result<ReplyEnvelope, TransportError> {
    reply
        .await
        .map_err(|_| TransportError::ConnectionRefused("Redis reply stream closed".to_string()))
}

async fn subscribe_replies(client: &Client) -> Result<PubSub, TransportError> {
    let mut pubsub = client.get_async_pubsub().await.map_err(map_redis_error)?;
    pubsub
        .psubscribe(reply_channel("*"))
        .await
        .map_err(map_redis_error)?;
    Ok(pubsub)
}

/// Route replies to their waiting requests until the stream ends
async fn dispatch_replies(pubsub: &mut PubSub, pending: &PendingReplies) {
    let stream = pubsub.on_message();
    tokio::pin!(stream);

    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to read reply payload: {}", e);
                continue;
            }
        };

        let reply: ReplyEnvelope = match serde_json::from_str(&payload) {
            Ok(r) => r,
            Err(e) => {
                warn!("Discarding malformed reply: {}", e);
                continue;
            }
        };

        let sender = pending.lock().ok().and_then(|mut p| p.remove(&reply.id));
        match sender {
            Some(sender) => {
                let _ = sender.send(reply);
            }
            None => debug!("No pending request for reply: id={}", reply.id),
        }
    }
}

/// Reply reader loop; resubscribes with backoff whenever the stream ends
async fn read_replies(
    client: Client,
    mut pubsub: Option<PubSub>,
    pending: PendingReplies,
    health: TransportHealth,
) {
    let mut backoff = Backoff::default();

    loop {
        if let Some(mut subscribed) = pubsub.take() {
            health.set_connected(true);
            backoff.reset();
            dispatch_replies(&mut subscribed, &pending).await;

            health.set_connected(false);
            let failed = fail_pending(&pending);
            warn!("Redis reply stream ended: failed_requests={}", failed);
        }

        tokio::time::sleep(backoff.next_delay()).await;

        match subscribe_replies(&client).await {
            Ok(subscribed) => {
                info!("Redis reply stream resubscribed");
                pubsub = Some(subscribed);
            }
            Err(e) => warn!("Failed to resubscribe to Redis replies: {}", e),
        }
    }
}

/// Requesting side of the Redis transport
pub struct RedisTransport {
    publisher: ConnectionManager,
    pending: PendingReplies,
    health: TransportHealth,
    reader: JoinHandle<()>,
}

impl fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTransport")
            .field("publisher", &"<ConnectionManager>")
            .field("connected", &self.health.is_connected())
            .finish()
    }
}

impl RedisTransport {
    /// Connect and start listening on every reply channel
    pub async fn connect(config: &RedisTransportConfig) -> Result<Self, TransportError> {
        let client = config.client()?;
        let publisher = config.publisher(&client).await?;
        let pubsub = subscribe_replies(&client).await?;

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let health = TransportHealth::default();
        health.set_connected(true);

        let reader = tokio::spawn(read_replies(
            client,
            Some(pubsub),
            pending.clone(),
            health.clone(),
        ));

        info!("Redis transport connected");

        Ok(Self {
            publisher,
            pending,
            health,
            reader,
        })
    }

    /// Live state of the reply subscription
    pub fn health(&self) -> TransportHealth {
        self.health.clone()
    }
}

impl Drop for RedisTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl MessageTransport for RedisTransport {
    async fn send(&self, pattern: &str, data: Value) -> Result<Option<Value>, TransportError> {
        let id = Uuid::new_v4().to_string();
        let request = RequestEnvelope {
            id: id.clone(),
            pattern: pattern.to_string(),
            data,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| TransportError::Other(format!("Failed to encode request: {}", e)))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| TransportError::Other("pending reply table poisoned".to_string()))?
            .insert(id.clone(), reply_tx);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };

        // Checked after registering: a stream end racing this request drains
        // the entry just inserted.
        if !self.health.is_connected() {
            return Err(TransportError::ConnectionRefused(
                "Redis reply stream is down".to_string(),
            ));
        }

        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(pattern, payload)
            .await
            .map_err(map_redis_error)?;

        if receivers == 0 {
            return Err(TransportError::ConnectionRefused(format!(
                "no responder subscribed to {}",
                pattern
            )));
        }

        await_reply(reply_rx).await?.into_result()
    }
}

/// How one subscription of the listener ended
enum ServeExit {
    Shutdown,
    StreamEnded,
}

/// Responding side of the Redis transport
pub struct RedisListener {
    client: Client,
    publisher: ConnectionManager,
    health: TransportHealth,
}

impl fmt::Debug for RedisListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisListener")
            .field("connected", &self.health.is_connected())
            .finish_non_exhaustive()
    }
}

impl RedisListener {
    pub async fn connect(config: &RedisTransportConfig) -> Result<Self, TransportError> {
        let client = config.client()?;
        let publisher = config.publisher(&client).await?;

        Ok(Self {
            client,
            publisher,
            health: TransportHealth::default(),
        })
    }

    /// Live state of the request subscription; false until `serve` subscribes
    pub fn health(&self) -> TransportHealth {
        self.health.clone()
    }

    /// Answer requests for the handler's patterns until `shutdown` resolves
    ///
    /// A failed subscribe or an ended stream is retried with backoff; only
    /// shutdown returns.
    pub async fn serve<F>(self, handler: Arc<dyn MessageHandler>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut backoff = Backoff::default();

        loop {
            let subscribed = tokio::select! {
                _ = &mut shutdown => break,
                result = self.subscribe(handler.patterns()) => result,
            };

            match subscribed {
                Ok(mut pubsub) => {
                    self.health.set_connected(true);
                    backoff.reset();
                    info!("Redis listener subscribed: patterns={:?}", handler.patterns());

                    let exit = self.answer(&mut pubsub, &handler, shutdown.as_mut()).await;
                    self.health.set_connected(false);

                    match exit {
                        ServeExit::Shutdown => break,
                        ServeExit::StreamEnded => warn!("Redis request stream ended"),
                    }
                }
                Err(e) => warn!("Failed to subscribe to Redis request channels: {}", e),
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.health.set_connected(false);
        info!("Redis listener stopped");
    }

    async fn subscribe(&self, patterns: &[&str]) -> Result<PubSub, TransportError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(map_redis_error)?;
        for pattern in patterns {
            pubsub.subscribe(*pattern).await.map_err(map_redis_error)?;
        }
        Ok(pubsub)
    }

    async fn answer<F>(
        &self,
        pubsub: &mut PubSub,
        handler: &Arc<dyn MessageHandler>,
        mut shutdown: Pin<&mut F>,
    ) -> ServeExit
    where
        F: Future<Output = ()>,
    {
        let stream = pubsub.on_message();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown.as_mut() => return ServeExit::Shutdown,
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return ServeExit::StreamEnded;
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("Failed to read request payload: {}", e);
                            continue;
                        }
                    };

                    let request: RequestEnvelope = match serde_json::from_str(&payload) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Discarding malformed request: {}", e);
                            continue;
                        }
                    };

                    let handler = handler.clone();
                    let mut publisher = self.publisher.clone();

                    tokio::spawn(async move {
                        let result = handler.handle(&request.pattern, request.data).await;
                        let reply = ReplyEnvelope::from_result(request.id, result);

                        let payload = match serde_json::to_string(&reply) {
                            Ok(p) => p,
                            Err(e) => {
                                error!("Failed to encode reply: {}", e);
                                return;
                            }
                        };

                        let published: Result<i64, _> = publisher
                            .publish(reply_channel(&request.pattern), payload)
                            .await;
                        if let Err(e) = published {
                            error!("Failed to publish reply: pattern={}, error={}", request.pattern, e);
                        }
                    });
                }
            }
        }
    }
}
