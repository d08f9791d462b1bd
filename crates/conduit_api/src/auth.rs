//! Authentication for the authenticated query endpoints.
//!
//! Token validation itself is a black box behind [`TokenValidator`]; this
//! module owns bearer-header extraction, the distinct failure kinds with
//! their status codes, and the database-from-claims routing rule.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub subject: String,
    /// Database the token is scoped to; authenticated queries route here.
    pub database: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Authentication failures, each with its user-facing message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication required: missing or malformed Authorization header")]
    MissingToken,

    #[error("Invalid or expired JWT token")]
    InvalidToken,

    #[error("JWT token missing database information")]
    MissingDatabaseClaim,
}

impl AuthError {
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::MissingDatabaseClaim => {
                401
            }
        }
    }
}

/// Validates a bearer token and returns its claims.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let token = header.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?;
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Validate a token and extract the database claim in one step.
pub fn validate_and_extract_database(
    validator: &dyn TokenValidator,
    token: &str,
) -> Result<(Claims, String), AuthError> {
    let claims = validator.validate(token)?;
    let database = claims
        .database
        .clone()
        .filter(|db| !db.is_empty())
        .ok_or(AuthError::MissingDatabaseClaim)?;
    Ok((claims, database))
}

/// In-memory validator mapping token strings to claims.
///
/// Stands in for the real JWT validation service in tests and local runs.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, Claims>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        StaticTokenValidator::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, claims: Claims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.tokens.get(token).ok_or(AuthError::InvalidToken)?;
        if let Some(expires_at) = claims.expires_at {
            if expires_at < Utc::now() {
                return Err(AuthError::InvalidToken);
            }
        }
        Ok(claims.clone())
    }
}
