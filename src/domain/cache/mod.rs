//! Cache domain - Key-value cache abstraction with explicit invalidation

mod repository;

pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
