//! Authentication state and extractors for axum.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use eventhub_core::{
    AuthConfig, CredentialStore, OwnerLookup, PublicUser, SigningSecret, UserId, UserRecord,
};

use super::AuthError;
use super::credentials::{Argon2Hasher, CredentialHasher};
use super::gate::{AuthorizationGate, Principal};
use super::jwt::{IssuedToken, JwtManager, TokenService};
use crate::response::ErrorBody;

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
    credentials: Arc<dyn CredentialStore>,
    gate: AuthorizationGate,
}

impl AuthState {
    /// Create a new auth state from its parts.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
        credentials: Arc<dyn CredentialStore>,
        owners: Arc<dyn OwnerLookup>,
    ) -> Self {
        let gate = AuthorizationGate::new(tokens.clone(), owners)
            .conceal_foreign_resources(config.conceal_foreign_resources);
        Self {
            config,
            hasher,
            tokens,
            credentials,
            gate,
        }
    }

    /// Initialize auth state, auto-generating a signing secret if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the secret or hashing parameters are invalid.
    pub fn initialize(
        mut config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        owners: Arc<dyn OwnerLookup>,
    ) -> Result<Self, AuthError> {
        if config.jwt_secret.is_none() {
            config.jwt_secret = Some(SigningSecret::new(JwtManager::generate_hex_secret()));
            tracing::warn!(
                "No signing secret configured; generated an ephemeral one. \
                 Issued tokens will not survive a restart"
            );
        }

        let tokens = JwtManager::from_config(&config)?;
        let hasher = Argon2Hasher::new(&config.password_hashing)?;
        tracing::debug!(key_version = tokens.current_version(), "Auth initialized");

        Ok(Self::new(
            config,
            Arc::new(hasher),
            Arc::new(tokens),
            credentials,
            owners,
        ))
    }

    /// The authorization gate.
    #[must_use]
    pub const fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `MissingToken`, `TokenInvalid` or `TokenExpired`.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AuthError> {
        self.gate.authenticate(authorization)
    }

    /// Register a new user. Expects an already validated email and password.
    ///
    /// # Errors
    ///
    /// Returns `UserExists` if the email is taken.
    pub fn signup(&self, email: &str, password: &str) -> Result<PublicUser, AuthError> {
        let hash = self.hasher.hash(password)?;
        let id = self.credentials.create_credential(email, &hash)?;
        let user = self
            .credentials
            .find_by_email(email)?
            .ok_or_else(|| AuthError::Storage(format!("user {id} missing after signup")))?;
        Ok(user.to_public())
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials`, or an infrastructure error.
    pub fn login(&self, email: &str, password: &str) -> Result<(UserRecord, IssuedToken), AuthError> {
        let Some(user) = self.credentials.find_by_email(email)? else {
            tracing::debug!("Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.tokens.issue(user.id, &user.email)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, issued))
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Extractor for authenticated requests.
///
/// Use this in handler parameters to require authentication. It must come
/// before any extractor that reads the body or looks up a resource, so an
/// unauthenticated caller learns nothing else about the request.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Principal);

impl RequireAuth {
    /// Get the user ID.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0.user_id
    }

    /// Get the email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.0.email
    }

    /// Get the principal.
    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(principal.clone()));
        }

        let auth_state = Arc::<AuthState>::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| {
                value.to_str().map_err(|_| {
                    AuthError::TokenInvalid("Authorization header is not valid ASCII".to_string())
                })
            })
            .transpose()?;

        let principal = auth_state.authenticate(header)?;
        parts.extensions.insert(principal.clone());
        Ok(Self(principal))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token", "Not authorized"),
            Self::TokenInvalid(_) => (StatusCode::UNAUTHORIZED, "invalid_token", "Not authorized"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired", "Not authorized"),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Could not authenticate user",
            ),
            Self::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Not authorized to modify event",
            ),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", "Could not find event"),
            Self::UserExists(_) => (StatusCode::CONFLICT, "user_exists", "Could not create user"),
            Self::Hashing(_) | Self::Signing(_) | Self::Storage(_) | Self::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };

        let error = if self.is_internal() {
            tracing::error!(error = %self, "Auth infrastructure failure");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { message, error, code })).into_response();
        if self.is_unauthenticated() {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
