//! Core types used throughout Eventhub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a user account, the principal a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// Big-endian key bytes, used as the sled key.
    #[must_use]
    pub const fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a sled key.
    #[must_use]
    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(|b| Self(u64::from_be_bytes(b)))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an event, the resource mutated under ownership rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// Big-endian key bytes, used as the sled key.
    #[must_use]
    pub const fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Stored credential record.
///
/// Holds the Argon2 PHC string, never the plaintext. Use [`UserRecord::to_public`]
/// for anything that leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, unique (case-insensitive).
    pub email: String,
    /// Password hash.
    pub password_hash: String,
    /// When the user signed up.
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a safe version of the user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID.
    pub id: EventId,
    /// Event name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Where it takes place.
    pub location: String,
    /// When it takes place.
    pub date_time: DateTime<Utc>,
    /// Owner of the event. Assigned at creation, never changed.
    pub user_id: UserId,
}

/// Caller-supplied event fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Event name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Where it takes place.
    pub location: String,
    /// When it takes place.
    pub date_time: DateTime<Utc>,
}

/// A value stamped with the principal that owns it.
///
/// Resource creation only accepts owned values, so a resource cannot be
/// persisted without an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owned<T> {
    owner: UserId,
    value: T,
}

impl<T> Owned<T> {
    /// Stamp `value` with `owner`.
    #[must_use]
    pub const fn new(owner: UserId, value: T) -> Self {
        Self { owner, value }
    }

    /// The owning principal.
    #[must_use]
    pub const fn owner(&self) -> UserId {
        self.owner
    }

    /// Borrow the wrapped value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Split into owner and value.
    #[must_use]
    pub fn into_parts(self) -> (UserId, T) {
        (self.owner, self.value)
    }
}

/// A user's registration for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Event registered for.
    pub event_id: EventId,
    /// Registered user.
    pub user_id: UserId,
    /// When the registration was made.
    pub registered_at: DateTime<Utc>,
}
