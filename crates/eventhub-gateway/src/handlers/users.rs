//! Signup and login handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use eventhub_core::PublicUser;
use eventhub_core::validation::{validate_email, validate_password};
use serde::{Deserialize, Serialize};

use crate::response::{ApiError, ApiJson, ApiResponse};
use crate::server::GatewayState;

/// Signup and login body.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Outcome message.
    pub message: &'static str,
    /// Bearer token.
    pub token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

/// `POST /user/signup`
pub async fn signup(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), ApiError> {
    let email = validate_email(&body.email)?;
    validate_password(&body.password)?;

    // Hashing is CPU-bound; run it on the blocking pool.
    let auth = state.auth.clone();
    let user = tokio::task::spawn_blocking(move || auth.signup(&email, &body.password))
        .await
        .map_err(|e| ApiError::Internal(format!("Signup task failed: {e}")))??;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new("User created successfully", user),
    ))
}

/// `POST /user/login`
pub async fn login(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = validate_email(&body.email)?;
    validate_password(&body.password)?;

    if !state.login_limiter.check(&email) {
        return Err(ApiError::RateLimited);
    }

    let auth = state.auth.clone();
    let (_, issued) = tokio::task::spawn_blocking(move || auth.login(&email, &body.password))
        .await
        .map_err(|e| ApiError::Internal(format!("Login task failed: {e}")))??;

    Ok(Json(LoginResponse {
        message: "Login successful",
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}
