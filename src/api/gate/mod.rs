//! Gate-protected API

pub mod token_info;

use axum::{routing::get, Router};

/// Routes served behind the access gate
pub fn create_gate_router() -> Router {
    Router::new().route("/token-info", get(token_info::token_info))
}
