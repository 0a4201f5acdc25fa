//! Administrative API

pub mod access_keys;

use axum::{routing::get, Router};

use super::state::DirectoryState;

/// Access key CRUD routes
pub fn create_admin_router() -> Router<DirectoryState> {
    Router::new()
        .route(
            "/access-keys",
            get(access_keys::list_access_keys).post(access_keys::create_access_key),
        )
        .route(
            "/access-keys/{key}",
            get(access_keys::get_access_key)
                .put(access_keys::update_access_key)
                .delete(access_keys::delete_access_key),
        )
}
