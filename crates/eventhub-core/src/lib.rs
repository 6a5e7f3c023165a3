//! # Eventhub Core
//!
//! Core types, configuration, and storage for Eventhub.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Event and user domain types
//! - A sled-backed data store with the lookup traits consumed by the auth layer
//! - Input validation and sanitization
//! - Redacting wrappers for secrets

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{AuthConfig, Config, ConfigError};
pub use secrets::SigningSecret;
pub use store::{CredentialStore, Database, EventStore, OwnerLookup, StoreError, UserStore};
pub use types::{Event, EventDraft, EventId, Owned, PublicUser, Registration, UserId, UserRecord};
pub use validation::ValidationError;

