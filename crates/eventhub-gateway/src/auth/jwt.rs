//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `userId`, `email`, `iat` and `expiredAt`.
//! The header `kid` names the signing key version so secrets can be rotated
//! without invalidating tokens signed by a retired key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use eventhub_core::{AuthConfig, UserId};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, decode_header,
    encode,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// How long an issued token stays valid.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(2 * 60 * 60);

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Principal the token was issued to.
    pub user_id: UserId,
    /// Email at issuance. Informational only.
    pub email: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiry (Unix timestamp). The token is valid up to and including this second.
    pub expired_at: i64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Issues and verifies bearer tokens.
pub trait TokenService: Send + Sync {
    /// Sign a token for a principal, valid for [`TOKEN_VALIDITY`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    fn issue(&self, user_id: UserId, email: &str) -> Result<IssuedToken, AuthError>;

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for a genuine but stale token, and
    /// `TokenInvalid` for anything malformed, forged or signed with an
    /// unknown key.
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256 token manager with a versioned key ring.
pub struct JwtManager {
    keys: HashMap<u32, SigningKey>,
    current: u32,
    clock: Arc<dyn Clock>,
}

impl JwtManager {
    /// Create a manager signing with `secret` as key version 1.
    ///
    /// The secret should be at least 32 bytes for security.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_version(secret, 1)
    }

    /// Create a manager signing with `secret` under an explicit key version.
    #[must_use]
    pub fn with_version(secret: &[u8], version: u32) -> Self {
        let mut keys = HashMap::new();
        keys.insert(version, SigningKey::from_secret(secret));
        Self {
            keys,
            current: version,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build from auth config, including retired keys.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if no secret is configured, a secret is
    /// not valid hex, or a secret is empty.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config
            .jwt_secret
            .as_ref()
            .ok_or_else(|| AuthError::Config("No signing secret configured".to_string()))?;

        let mut manager = Self::with_version(
            &decode_secret(secret.expose(), config.key_version)?,
            config.key_version,
        );
        for retired in &config.retired_keys {
            manager = manager.with_retired_key(
                retired.version,
                &decode_secret(retired.secret.expose(), retired.version)?,
            );
        }
        Ok(manager)
    }

    /// Also accept tokens signed with a retired key. The active key is never replaced.
    #[must_use]
    pub fn with_retired_key(mut self, version: u32, secret: &[u8]) -> Self {
        if version != self.current {
            self.keys.insert(version, SigningKey::from_secret(secret));
        }
        self
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Version of the key used for signing.
    #[must_use]
    pub const fn current_version(&self) -> u32 {
        self.current
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    fn validation() -> Validation {
        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation
    }
}

impl TokenService for JwtManager {
    fn issue(&self, user_id: UserId, email: &str) -> Result<IssuedToken, AuthError> {
        let key = self
            .keys
            .get(&self.current)
            .ok_or_else(|| AuthError::Signing("Active signing key missing".to_string()))?;

        let now = self.clock.now();
        let validity = TimeDelta::from_std(TOKEN_VALIDITY)
            .map_err(|e| AuthError::Signing(format!("Invalid token validity: {e}")))?;
        let expires_at = now + validity;

        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            expired_at: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.current.to_string());

        let token = encode(&header, &claims, &key.encoding)
            .map_err(|e| AuthError::Signing(format!("Encoding failed: {e}")))?;

        tracing::debug!(user_id = %user_id, key_version = self.current, "Issued token");
        Ok(IssuedToken { token, expires_at })
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::TokenInvalid(format!("Malformed token: {e}")))?;

        let version: u32 = header
            .kid
            .as_deref()
            .and_then(|kid| kid.parse().ok())
            .ok_or_else(|| AuthError::TokenInvalid("Missing key version".to_string()))?;

        let key = self.keys.get(&version).ok_or_else(|| {
            AuthError::TokenInvalid(format!("Unknown signing key version {version}"))
        })?;

        let data: TokenData<Claims> = decode(token, &key.decoding, &Self::validation())
            .map_err(|e| AuthError::TokenInvalid(format!("Validation failed: {e}")))?;

        if self.clock.now().timestamp() > data.claims.expired_at {
            return Err(AuthError::TokenExpired);
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut versions: Vec<_> = self.keys.keys().copied().collect();
        versions.sort_unstable();
        f.debug_struct("JwtManager")
            .field("current", &self.current)
            .field("versions", &versions)
            .finish_non_exhaustive()
    }
}

fn decode_secret(hex_secret: &str, version: u32) -> Result<Vec<u8>, AuthError> {
    let secret = hex::decode(hex_secret)
        .map_err(|e| AuthError::Config(format!("Invalid hex secret for key {version}: {e}")))?;
    if secret.is_empty() {
        return Err(AuthError::Config(format!(
            "Signing secret for key {version} is empty"
        )));
    }
    if secret.len() < 32 {
        tracing::warn!(
            key_version = version,
            bytes = secret.len(),
            "Signing secret is shorter than 32 bytes"
        );
    }
    Ok(secret)
}
