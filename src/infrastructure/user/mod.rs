//! User infrastructure - storage-backed owner lookups

mod storage_repository;

pub use storage_repository::StorageUserRepository;
