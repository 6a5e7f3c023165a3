//! Gateway server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use eventhub_core::{AuthConfig, Config, Database, EventStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::GatewayError;
use crate::auth::AuthState;
use crate::handlers::{self, events, users};
use crate::middleware::GatewayRateLimiter;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
    /// Data directory for persistent storage.
    pub data_dir: PathBuf,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Login attempts allowed per email per minute.
    pub login_attempts_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            port: config.server.port,
            bind_address: config.server.bind_address(),
            cors: config.server.cors,
            data_dir: config.data_dir(),
            auth: config.auth.clone(),
            login_attempts_per_minute: config.server.login_attempts_per_minute,
        }
    }
}

/// Router state shared across handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Event store.
    pub events: Arc<EventStore>,
    /// Per-email login throttle.
    pub login_limiter: Arc<GatewayRateLimiter>,
}

impl FromRef<GatewayState> for Arc<AuthState> {
    fn from_ref(state: &GatewayState) -> Self {
        state.auth.clone()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("auth", &self.auth)
            .field("login_limiter", &self.login_limiter)
            .finish_non_exhaustive()
    }
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
    database: Database,
}

/// Builder for constructing a Gateway with its dependencies.
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    database: Option<Database>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an already opened database instead of opening `data_dir`.
    #[must_use]
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or auth initialization fails.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let database = match self.database {
            Some(database) => database,
            None => {
                std::fs::create_dir_all(&self.config.data_dir).map_err(|e| {
                    GatewayError::Config(format!("Failed to create data dir: {e}"))
                })?;
                Database::open(&self.config.data_dir)
                    .map_err(|e| GatewayError::Server(format!("Failed to open database: {e}")))?
            }
        };

        let events = Arc::new(
            database
                .events()
                .map_err(|e| GatewayError::Server(format!("Failed to open event store: {e}")))?,
        );

        // Ownership checks must read the same event store the handlers write.
        let users = database
            .users()
            .map_err(|e| GatewayError::Server(format!("Failed to open user store: {e}")))?;
        let auth_config = self.config.auth.clone().with_env_overrides();
        let auth = Arc::new(
            AuthState::initialize(auth_config, Arc::new(users), events.clone())
                .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
        );

        let state = GatewayState {
            auth,
            events,
            login_limiter: Arc::new(GatewayRateLimiter::new(
                self.config.login_attempts_per_minute,
            )),
        };

        Ok(Gateway {
            config: self.config,
            state,
            database,
        })
    }
}

impl Gateway {
    /// Create a gateway, opening the database in `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or auth initialization fails.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/events", get(events::list_events))
            .route("/event", post(events::create_event))
            .route(
                "/event/{event_id}",
                get(events::get_event)
                    .put(events::update_event)
                    .delete(events::delete_event),
            )
            .route(
                "/event/{event_id}/register",
                post(events::register).delete(events::unregister),
            )
            .route(
                "/event/{event_id}/registrations",
                get(events::list_registrations),
            )
            .route("/user/signup", post(users::signup))
            .route("/user/login", post(users::login))
            .layer(TraceLayer::new_for_http());

        let router = if self.config.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// Run the gateway server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound or serving fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let listener =
            tokio::net::TcpListener::bind((self.config.bind_address.as_str(), self.config.port))
                .await?;
        let addr = listener.local_addr()?;
        tracing::info!("Gateway API listening on http://{}", addr);

        let limiter = self.state.login_limiter.clone();
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limiter.retain_recent();
            }
        });

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();
        served?;

        self.database
            .flush()
            .map_err(|e| GatewayError::Server(format!("Failed to flush database: {e}")))?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_core_config() {
        let mut core = Config::default();
        core.server.port = 9090;
        core.server.cors = false;
        core.server.login_attempts_per_minute = 3;
        core.auth.conceal_foreign_resources = true;

        let config = GatewayConfig::from(&core);
        assert_eq!(config.port, 9090);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(!config.cors);
        assert_eq!(config.login_attempts_per_minute, 3);
        assert!(config.auth.conceal_foreign_resources);
    }

    #[test]
    fn test_build_with_temporary_database() {
        let gateway = GatewayBuilder::new()
            .with_database(Database::temporary().unwrap())
            .build()
            .unwrap();

        assert!(gateway.state().auth.config.jwt_secret.is_some());
        let _router = gateway.router();
    }

    #[test]
    fn test_gate_reads_the_gateway_event_store() {
        use crate::auth::Principal;
        use eventhub_core::{EventDraft, Owned, UserId};

        let gateway = GatewayBuilder::new()
            .with_database(Database::temporary().unwrap())
            .build()
            .unwrap();
        let state = gateway.state();

        let event = state
            .events
            .create(Owned::new(
                UserId(1),
                EventDraft {
                    name: "Rust Meetup".to_string(),
                    description: "Monthly meetup".to_string(),
                    location: "Bandung".to_string(),
                    date_time: "2025-12-16T09:00:00Z".parse().unwrap(),
                },
            ))
            .unwrap();

        let owner = Principal {
            user_id: UserId(1),
            email: "owner@x.com".to_string(),
        };
        let stranger = Principal {
            user_id: UserId(2),
            email: "stranger@x.com".to_string(),
        };

        let gate = state.auth.gate();
        assert!(gate.authorize_mutation(&owner, event.id).is_ok());
        assert!(matches!(
            gate.authorize_mutation(&stranger, event.id),
            Err(crate::auth::AuthError::Forbidden(_))
        ));
    }
}
