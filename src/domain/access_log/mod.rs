//! Access log domain - audit trail of access checks

mod entity;
mod repository;

pub use entity::{AccessLog, AccessLogId};
pub use repository::AccessLogRepository;

#[cfg(test)]
pub use repository::mock::MockAccessLogRepository;
