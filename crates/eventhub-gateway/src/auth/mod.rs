//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Password hashing and verification (Argon2id)
//! - Signed, time-bounded bearer tokens (HS256 JWT with key versions)
//! - The authorization gate: token verification and ownership checks
//! - Axum extractors for protected routes

mod credentials;
mod gate;
mod jwt;
mod middleware;

pub use credentials::{Argon2Hasher, CredentialHasher};
pub use gate::{AuthorizationGate, Principal, extract_bearer};
pub use jwt::{Claims, Clock, IssuedToken, JwtManager, SystemClock, TOKEN_VALIDITY, TokenService};
pub use middleware::{AuthState, RequireAuth};

use eventhub_core::StoreError;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("Missing authorization token")]
    MissingToken,

    /// Token is malformed, forged, or signed with an unknown key.
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// Token signature is valid but its validity window has passed.
    #[error("Token expired")]
    TokenExpired,

    /// Unknown email or wrong password, never told apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Authenticated, but not entitled to act on the resource.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource to authorize against does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Email already registered.
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Token signing failed.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether this is one of the "who are you" rejections (missing, invalid
    /// or expired token).
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::TokenInvalid(_) | Self::TokenExpired
        )
    }

    /// Whether this is an infrastructure failure rather than a rejection.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Hashing(_) | Self::Signing(_) | Self::Storage(_) | Self::Config(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(email) => Self::UserExists(email),
            other => Self::Storage(other.to_string()),
        }
    }
}
