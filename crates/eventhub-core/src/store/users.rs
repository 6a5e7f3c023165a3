//! User storage.

use chrono::Utc;

use super::{CredentialStore, StoreError, next_id};
use crate::types::{UserId, UserRecord};
use crate::validation::canonical_email;

/// User store backed by sled.
///
/// Records live in the `users` tree keyed by ID; the `user_emails` tree maps
/// canonical email to ID and enforces uniqueness.
pub struct UserStore {
    db: sled::Db,
    users: sled::Tree,
    emails: sled::Tree,
}

impl UserStore {
    pub(super) fn new(db: sled::Db) -> Result<Self, StoreError> {
        let users = db.open_tree("users")?;
        let emails = db.open_tree("user_emails")?;
        Ok(Self { db, users, emails })
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.users
            .get(id.to_key())?
            .map(|value| serde_json::from_slice(&value).map_err(StoreError::from))
            .transpose()
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut users = Vec::new();
        for result in self.users.iter() {
            let (_, value) = result?;
            users.push(serde_json::from_slice(&value)?);
        }
        Ok(users)
    }
}

impl CredentialStore for UserStore {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let key = canonical_email(email);
        match self.emails.get(key.as_bytes())? {
            Some(id_bytes) => match UserId::from_key(&id_bytes) {
                Some(id) => self.get(id),
                None => Err(StoreError::NotFound(format!("Corrupt email index for {key}"))),
            },
            None => Ok(None),
        }
    }

    fn create_credential(&self, email: &str, password_hash: &str) -> Result<UserId, StoreError> {
        let email = canonical_email(email);
        let id = UserId(next_id(&self.db)?);

        // Claim the email atomically; losing the race means it is taken.
        let claimed = self.emails.compare_and_swap(
            email.as_bytes(),
            None as Option<&[u8]>,
            Some(&id.to_key()[..]),
        )?;
        if claimed.is_err() {
            return Err(StoreError::Conflict(email));
        }

        let record = UserRecord {
            id,
            email: email.clone(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        let stored = serde_json::to_vec(&record)
            .map_err(StoreError::from)
            .and_then(|value| Ok(self.users.insert(id.to_key(), value)?));
        if let Err(e) = stored {
            self.emails.remove(email.as_bytes())?;
            return Err(e);
        }

        self.users.flush()?;
        self.emails.flush()?;

        tracing::info!(user_id = %id, "User created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use tempfile::TempDir;

    #[test]
    fn test_user_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = Database::open(temp_dir.path()).unwrap().users().unwrap();

        assert!(store.list().unwrap().is_empty());

        let id = store.create_credential("admin@x.com", "$argon2id$hash").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.email, "admin@x.com");
        assert_eq!(loaded.password_hash, "$argon2id$hash");

        let by_email = store.find_by_email("admin@x.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let store = Database::temporary().unwrap().users().unwrap();
        let id = store.create_credential("Mixed@Case.com", "hash").unwrap();

        let found = store.find_by_email("  mixed@case.COM ").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.email, "mixed@case.com");
    }

    #[test]
    fn test_duplicate_email() {
        let store = Database::temporary().unwrap().users().unwrap();

        store.create_credential("a@x.com", "hash1").unwrap();
        let result = store.create_credential("A@x.com", "hash2");

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_email() {
        let store = Database::temporary().unwrap().users().unwrap();
        assert!(store.find_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn test_ids_are_distinct() {
        let store = Database::temporary().unwrap().users().unwrap();
        let a = store.create_credential("a@x.com", "h").unwrap();
        let b = store.create_credential("b@x.com", "h").unwrap();

        assert_ne!(a, b);
        assert!(a.0 >= 1);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_reopen_keeps_users() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let db = Database::open(temp_dir.path()).unwrap();
            let id = db.users().unwrap().create_credential("a@x.com", "h").unwrap();
            db.flush().unwrap();
            id
        };

        let store = Database::open(temp_dir.path()).unwrap().users().unwrap();
        assert_eq!(store.find_by_email("a@x.com").unwrap().unwrap().id, id);
    }
}
