//! # Eventhub Gateway
//!
//! HTTP gateway for the events service: credential hashing, bearer tokens,
//! the authorization gate, and the axum router that ties them to the store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
/// HTTP handlers.
pub mod handlers;
mod middleware;
/// Response envelopes and handler errors.
pub mod response;
mod server;

pub use auth::{AuthError, AuthState, AuthorizationGate, Principal, RequireAuth};
pub use eventhub_core::AuthConfig;
pub use middleware::GatewayRateLimiter;
pub use response::{ApiError, ApiResponse};
pub use server::{Gateway, GatewayBuilder, GatewayConfig, GatewayState};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
