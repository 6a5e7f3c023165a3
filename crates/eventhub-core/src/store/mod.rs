//! Persistent storage backed by sled.
//!
//! The auth layer never touches sled directly. It consumes the two lookup
//! traits defined here, [`CredentialStore`] and [`OwnerLookup`], which the
//! concrete stores implement.

mod events;
mod users;

use std::path::Path;

use sled::transaction::TransactionError;
use thiserror::Error;

use crate::types::{EventId, UserId, UserRecord};

pub use events::EventStore;
pub use users::UserStore;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage engine error.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unique constraint violated.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Credential records, as consumed by signup and login.
pub trait CredentialStore: Send + Sync {
    /// Find the credential record for an email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Persist a new credential record and return its principal ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is taken.
    fn create_credential(&self, email: &str, password_hash: &str) -> Result<UserId, StoreError>;
}

/// Ownership edges, as consumed by the authorization gate.
pub trait OwnerLookup: Send + Sync {
    /// Find the owner of an event. `None` if the event does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn find_owner(&self, event_id: EventId) -> Result<Option<UserId>, StoreError>;
}

/// Handle to the sled database.
///
/// Cheap to clone; all clones share the same underlying database.
#[derive(Clone)]
pub struct Database {
    db: sled::Db,
}

impl Database {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path.join("eventhub"))?;
        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self { db })
    }

    /// Open a throwaway database that is removed on drop.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// User store sharing this database.
    ///
    /// # Errors
    ///
    /// Returns error if the trees cannot be opened.
    pub fn users(&self) -> Result<UserStore, StoreError> {
        UserStore::new(self.db.clone())
    }

    /// Event store sharing this database.
    ///
    /// # Errors
    ///
    /// Returns error if the trees cannot be opened.
    pub fn events(&self) -> Result<EventStore, StoreError> {
        EventStore::new(self.db.clone())
    }

    /// Flush all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("size_on_disk", &self.db.size_on_disk().ok())
            .finish_non_exhaustive()
    }
}

/// Next identifier from sled's monotonic generator, starting at 1.
fn next_id(db: &sled::Db) -> Result<u64, StoreError> {
    Ok(db.generate_id()? + 1)
}
