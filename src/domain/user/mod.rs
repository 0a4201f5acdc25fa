//! User domain - owners of access keys
//!
//! Accounts are managed elsewhere; this crate only needs existence checks and
//! batch lookup for display enrichment.

mod entity;
mod repository;

pub use entity::User;
pub use repository::UserRepository;
