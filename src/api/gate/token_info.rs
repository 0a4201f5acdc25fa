//! Access-key protected endpoints

use serde::Serialize;

use crate::api::middleware::GateContext;
use crate::api::types::Json;
use crate::domain::access_key::AccessKey;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfoResponse {
    pub message: String,
    pub access_key: AccessKey,
}

/// GET /token-info
pub async fn token_info(context: GateContext) -> Json<TokenInfoResponse> {
    Json(TokenInfoResponse {
        message: "Token info".to_string(),
        access_key: context.access_key,
    })
}
