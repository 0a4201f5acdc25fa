//! Operator bearer token validation

use std::fmt::Debug;

use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Claims carried by an operator token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorClaims {
    /// Subject (operator ID)
    pub sub: String,
    /// Issued at timestamp (Unix epoch)
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl OperatorClaims {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    pub fn operator_id(&self) -> &str {
        &self.sub
    }
}

/// Configuration for operator token validation
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Allowed clock skew in seconds
    pub leeway_secs: u64,
}

impl Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[hidden]")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            leeway_secs: 30,
        }
    }
}

/// Verifies operator tokens; issuance happens elsewhere
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("algorithm", &Algorithm::HS256)
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Result<Self, DomainError> {
        if config.secret.is_empty() {
            return Err(DomainError::configuration("JWT secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }

    /// Validate a raw token and return its claims
    pub fn validate(&self, token: &str) -> Result<OperatorClaims, DomainError> {
        decode::<OperatorClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => DomainError::unauthorized("Token expired"),
                _ => DomainError::unauthorized("Invalid token"),
            })
    }

    /// Validate an `Authorization` header value of the form `Bearer <token>`
    pub fn validate_bearer(&self, header: Option<&str>) -> Result<OperatorClaims, DomainError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DomainError::unauthorized("Missing bearer token"))?;

        self.validate(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp_offset: Duration) -> String {
        let now = Utc::now();
        let claims = OperatorClaims {
            sub: "operator-1".to_string(),
            iat: now.timestamp(),
            exp: (now + exp_offset).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn validator() -> JwtValidator {
        JwtValidator::new(&JwtConfig::new("test-secret")).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let claims = validator()
            .validate(&token("test-secret", Duration::hours(1)))
            .unwrap();

        assert_eq!(claims.operator_id(), "operator-1");
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_wrong_secret() {
        let err = validator()
            .validate(&token("other-secret", Duration::hours(1)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized { .. }));
    }

    #[test]
    fn test_expired_token() {
        let err = validator()
            .validate(&token("test-secret", Duration::hours(-1)))
            .unwrap_err();
        assert_eq!(err.message(), "Token expired");
    }

    #[test]
    fn test_bearer_header() {
        let validator = validator();
        let header = format!("Bearer {}", token("test-secret", Duration::hours(1)));

        assert!(validator.validate_bearer(Some(&header)).is_ok());
        assert!(validator.validate_bearer(None).is_err());
        assert!(validator.validate_bearer(Some("Basic abc")).is_err());
        assert!(validator.validate_bearer(Some("Bearer ")).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            JwtValidator::new(&JwtConfig::new("")),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_config_debug_hides_secret() {
        let debug = format!("{:?}", JwtConfig::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
