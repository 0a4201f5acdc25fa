//! Request/reply messaging between the gate and the directory

mod in_process;
mod message;
mod redis;

pub use in_process::{in_process_channel, InProcessListener, InProcessTransport};
pub use message::{
    reply_channel, MessageHandler, MessageTransport, RemoteError, ReplyEnvelope,
    RequestEnvelope, TransportError,
};
pub use redis::{RedisListener, RedisTransport, RedisTransportConfig, TransportHealth};
