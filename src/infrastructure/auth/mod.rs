//! Operator authentication

mod jwt;

pub use jwt::{JwtConfig, JwtValidator, OperatorClaims};
