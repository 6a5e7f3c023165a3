//! Configuration loading and validation.
//!
//! Config is JSON5. Location: `~/.eventhub/eventhub.json`, or
//! `$EVENTHUB_STATE_DIR/eventhub.json` when the variable is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::secrets::SigningSecret;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;

        // The file may carry the signing secret
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("eventhub.json")
    }

    /// Get the Eventhub state directory.
    ///
    /// Uses `EVENTHUB_STATE_DIR` env var if set, otherwise `~/.eventhub`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("EVENTHUB_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".eventhub")
        } else {
            PathBuf::from(".eventhub")
        }
    }

    /// Directory holding the database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.server.login_attempts_per_minute == 0 {
            return Err(ConfigError::Validation(
                "loginAttemptsPerMinute must be at least 1".to_string(),
            ));
        }

        self.auth.validate()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Login attempts allowed per email per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            login_attempts_per_minute: default_login_attempts(),
        }
    }
}

impl ServerConfig {
    /// Resolve the bind address for the configured mode.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

const fn default_true() -> bool {
    true
}

const fn default_login_attempts() -> u32 {
    10
}

/// Server bind mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Database directory. Defaults to `<state dir>/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Active signing secret (hex-encoded). Auto-generated if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<SigningSecret>,

    /// Version of the active signing secret, written into each token.
    #[serde(default = "default_key_version")]
    pub key_version: u32,

    /// Previous secrets still accepted for verification during rotation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired_keys: Vec<RetiredKey>,

    /// Answer `NotFound` instead of `Forbidden` when a caller mutates an
    /// event owned by someone else.
    #[serde(default)]
    pub conceal_foreign_resources: bool,

    /// Argon2 cost parameters.
    #[serde(default)]
    pub password_hashing: HashingConfig,
}

/// A retired signing secret, verified but never used to sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetiredKey {
    /// Key version as found in token headers.
    pub version: u32,
    /// Secret (hex-encoded).
    pub secret: SigningSecret,
    /// When the key stopped signing. Keys without a timestamp are never pruned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

// Argon2id defaults recommended by OWASP (19 MiB, 2 passes, 1 lane).
const fn default_memory_kib() -> u32 {
    19 * 1024
}

const fn default_iterations() -> u32 {
    2
}

const fn default_parallelism() -> u32 {
    1
}

const fn default_key_version() -> u32 {
    1
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            key_version: default_key_version(),
            retired_keys: Vec::new(),
            conceal_foreign_resources: false,
            password_hashing: HashingConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Load overrides from environment variables.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("EVENTHUB_JWT_SECRET") {
            if !secret.is_empty() {
                self.jwt_secret = Some(SigningSecret::new(secret));
            }
        }

        if let Some(version) = std::env::var("EVENTHUB_JWT_KEY_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.key_version = version;
        }

        self
    }

    /// Validate secrets and key versions.
    ///
    /// # Errors
    ///
    /// Returns error on malformed hex, or when a retired key reuses the
    /// active version or another retired version.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = &self.jwt_secret {
            secret
                .decode()
                .map_err(|e| ConfigError::Validation(format!("Invalid jwtSecret: {e}")))?;
        }

        let mut seen = vec![self.key_version];
        for key in &self.retired_keys {
            if seen.contains(&key.version) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate signing key version {}",
                    key.version
                )));
            }
            seen.push(key.version);

            key.secret.decode().map_err(|e| {
                ConfigError::Validation(format!("Invalid retired key {}: {e}", key.version))
            })?;
        }

        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the active signing secret (hex).
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(SigningSecret::new(secret.into()));
        self
    }

    /// Set the active key version.
    #[must_use]
    pub const fn key_version(mut self, version: u32) -> Self {
        self.config.key_version = version;
        self
    }

    /// Accept tokens signed with a retired secret.
    #[must_use]
    pub fn retired_key(mut self, version: u32, secret: impl Into<String>) -> Self {
        self.config.retired_keys.push(RetiredKey {
            version,
            secret: SigningSecret::new(secret.into()),
            retired_at: None,
        });
        self
    }

    /// Collapse `Forbidden` into `NotFound` for foreign events.
    #[must_use]
    pub const fn conceal_foreign_resources(mut self, conceal: bool) -> Self {
        self.config.conceal_foreign_resources = conceal;
        self
    }

    /// Set Argon2 cost parameters.
    #[must_use]
    pub const fn password_hashing(mut self, hashing: HashingConfig) -> Self {
        self.config.password_hashing = hashing;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}
