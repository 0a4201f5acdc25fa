//! Route guards
//!
//! Each route group is tagged with a [`RouteAccess`] and wrapped in the single
//! [`authorize`] middleware, which dispatches on the tag.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::types::ApiError;
use crate::domain::access_key::AccessKey;
use crate::infrastructure::access_key::{AccessGate, RateLimitResult};
use crate::infrastructure::auth::{JwtValidator, OperatorClaims};

pub const ACCESS_KEY_HEADER: &str = "x-access-key";
pub const RATE_LIMIT_HEADER: &str = "rate-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "rate-limit-remaining";

/// Who may call a route group
#[derive(Debug, Clone)]
pub enum RouteAccess {
    Public,
    /// Bearer JWT signed with the operator secret
    Operator(Arc<JwtValidator>),
    /// `x-access-key` checked by the gate
    AccessKey(Arc<AccessGate>),
}

/// Request context produced by a passed access check
#[derive(Debug, Clone)]
pub struct GateContext {
    pub access_key: AccessKey,
    pub rate_limit: RateLimitResult,
}

impl<S> FromRequestParts<S> for GateContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GateContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal("Route is not guarded by the access gate"))
    }
}

/// Dispatch on the route's access tag
pub async fn authorize(State(access): State<RouteAccess>, request: Request, next: Next) -> Response {
    match access {
        RouteAccess::Public => next.run(request).await,
        RouteAccess::Operator(validator) => authorize_operator(&validator, request, next).await,
        RouteAccess::AccessKey(gate) => authorize_access_key(&gate, request, next).await,
    }
}

async fn authorize_operator(validator: &JwtValidator, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match validator.validate_bearer(header) {
        Ok(claims) => {
            debug!("Operator authenticated: operator_id={}", claims.operator_id());
            request.extensions_mut().insert::<OperatorClaims>(claims);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn authorize_access_key(gate: &AccessGate, mut request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match gate.check(presented.as_deref()).await {
        Ok(grant) => {
            let key = grant.access_key.key().to_string();
            let rate_limit = grant.rate_limit;

            request.extensions_mut().insert(GateContext {
                access_key: grant.access_key,
                rate_limit,
            });

            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), &key, &rate_limit);
            response
        }
        Err(denial) => {
            let mut response = ApiError::from(denial.error).into_response();
            if let (Some(key), Some(rate_limit)) = (denial.key, denial.rate_limit) {
                set_rate_limit_headers(response.headers_mut(), &key, &rate_limit);
            }
            response
        }
    }
}

fn set_rate_limit_headers(headers: &mut HeaderMap, key: &str, rate_limit: &RateLimitResult) {
    if let Ok(value) = HeaderValue::from_str(key) {
        headers.insert(HeaderName::from_static(ACCESS_KEY_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_HEADER),
        HeaderValue::from(rate_limit.limit),
    );
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        HeaderValue::from(rate_limit.remaining),
    );
}
