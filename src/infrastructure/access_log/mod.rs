//! Audit log backends

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAccessLogRepository;
pub use postgres::PostgresAccessLogRepository;
