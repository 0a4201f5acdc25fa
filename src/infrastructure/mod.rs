//! Infrastructure layer - External service implementations

pub mod access_key;
pub mod access_log;
pub mod auth;
pub mod cache;
pub mod observability;
pub mod storage;
pub mod transport;
pub mod user;
