//! The authorization gate.
//!
//! Every protected operation passes through here: first `authenticate` turns
//! the `Authorization` header into a [`Principal`], then mutations of an
//! existing event go through `authorize_mutation`. Creation never consults an
//! owner; the new resource is stamped with the caller instead.

use std::sync::Arc;

use eventhub_core::{EventId, OwnerLookup, Owned, UserId};

use super::AuthError;
use super::jwt::{Claims, TokenService};

/// The authenticated identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User ID from the verified token.
    pub user_id: UserId,
    /// Email from the verified token.
    pub email: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
        }
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts both `Bearer <token>` (scheme matched case-insensitively) and a
/// bare token. Surrounding whitespace is ignored. Returns `None` when the
/// header is absent or carries no token.
#[must_use]
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer")
                && (rest.is_empty() || rest.starts_with(char::is_whitespace)) =>
        {
            rest.trim_start()
        }
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Token verification plus resource ownership checks.
pub struct AuthorizationGate {
    tokens: Arc<dyn TokenService>,
    owners: Arc<dyn OwnerLookup>,
    conceal_foreign_resources: bool,
}

impl AuthorizationGate {
    /// Create a gate.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenService>, owners: Arc<dyn OwnerLookup>) -> Self {
        Self {
            tokens,
            owners,
            conceal_foreign_resources: false,
        }
    }

    /// Report foreign events as `NotFound` rather than `Forbidden`.
    #[must_use]
    pub const fn conceal_foreign_resources(mut self, conceal: bool) -> Self {
        self.conceal_foreign_resources = conceal;
        self
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// `MissingToken` if there is no token, otherwise whatever token
    /// verification rejects with (`TokenInvalid` or `TokenExpired`).
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AuthError> {
        let token = extract_bearer(authorization).ok_or(AuthError::MissingToken)?;

        match self.tokens.verify(token) {
            Ok(claims) => Ok(claims.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                Err(e)
            }
        }
    }

    /// Require that `principal` owns the event.
    ///
    /// Used for updates, deletes and owner-only reads.
    ///
    /// # Errors
    ///
    /// `NotFound` if the event does not exist (or the lookup fails),
    /// `Forbidden` if someone else owns it.
    pub fn authorize_mutation(
        &self,
        principal: &Principal,
        event_id: EventId,
    ) -> Result<(), AuthError> {
        let owner = match self.owners.find_owner(event_id) {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Owner lookup failed");
                None
            }
        };

        match owner {
            None => Err(AuthError::NotFound(format!("event {event_id}"))),
            Some(owner) if owner == principal.user_id => Ok(()),
            Some(owner) => {
                tracing::info!(
                    event_id = %event_id,
                    owner = %owner,
                    user_id = %principal.user_id,
                    "Ownership check failed"
                );
                if self.conceal_foreign_resources {
                    Err(AuthError::NotFound(format!("event {event_id}")))
                } else {
                    Err(AuthError::Forbidden(format!(
                        "event {event_id} belongs to another user"
                    )))
                }
            }
        }
    }

    /// Stamp a new resource with its owner.
    #[must_use]
    pub fn stamp<T>(&self, principal: &Principal, value: T) -> Owned<T> {
        Owned::new(principal.user_id, value)
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("conceal_foreign_resources", &self.conceal_foreign_resources)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtManager;
    use eventhub_core::StoreError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Owners {
        owners: HashMap<EventId, UserId>,
        lookups: AtomicUsize,
        broken: bool,
    }

    impl OwnerLookup for Owners {
        fn find_owner(&self, event_id: EventId) -> Result<Option<UserId>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(StoreError::NotFound("storage offline".into()));
            }
            Ok(self.owners.get(&event_id).copied())
        }
    }

    fn setup(owners: Owners) -> (AuthorizationGate, Arc<JwtManager>, Arc<Owners>) {
        let tokens = Arc::new(JwtManager::new(&JwtManager::generate_secret()));
        let owners = Arc::new(owners);
        let gate = AuthorizationGate::new(tokens.clone(), owners.clone());
        (gate, tokens, owners)
    }

    fn principal(id: u64) -> Principal {
        Principal {
            user_id: UserId(id),
            email: format!("user{id}@x.com"),
        }
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("BEARER abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("  abc123  ")), Some("abc123"));
        assert_eq!(extract_bearer(Some("abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("")), None);
        assert_eq!(extract_bearer(Some("   ")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn test_authenticate() {
        let (gate, tokens, _) = setup(Owners::default());
        let token = tokens.issue(UserId(9), "nine@x.com").unwrap().token;

        let principal = gate.authenticate(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(principal.user_id, UserId(9));
        assert_eq!(principal.email, "nine@x.com");

        // Raw token without scheme is accepted too.
        assert_eq!(gate.authenticate(Some(&token)).unwrap().user_id, UserId(9));
    }

    #[test]
    fn test_authenticate_rejections() {
        let (gate, _, _) = setup(Owners::default());

        assert!(matches!(gate.authenticate(None), Err(AuthError::MissingToken)));
        assert!(matches!(gate.authenticate(Some("")), Err(AuthError::MissingToken)));
        assert!(matches!(
            gate.authenticate(Some("Bearer garbage")),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_owner_may_mutate() {
        let mut owners = Owners::default();
        owners.owners.insert(EventId(1), UserId(1));
        let (gate, _, _) = setup(owners);

        assert!(gate.authorize_mutation(&principal(1), EventId(1)).is_ok());
    }

    #[test]
    fn test_non_owner_is_forbidden() {
        let mut owners = Owners::default();
        owners.owners.insert(EventId(1), UserId(1));
        let (gate, _, _) = setup(owners);

        assert!(matches!(
            gate.authorize_mutation(&principal(2), EventId(1)),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_missing_event_is_not_found() {
        let (gate, _, _) = setup(Owners::default());
        assert!(matches!(
            gate.authorize_mutation(&principal(1), EventId(404)),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn test_lookup_failure_is_not_found() {
        let (gate, _, _) = setup(Owners {
            broken: true,
            ..Owners::default()
        });
        assert!(matches!(
            gate.authorize_mutation(&principal(1), EventId(1)),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn test_conceal_foreign_resources() {
        let mut owners = Owners::default();
        owners.owners.insert(EventId(1), UserId(1));
        let (gate, _, _) = setup(owners);
        let gate = gate.conceal_foreign_resources(true);

        assert!(matches!(
            gate.authorize_mutation(&principal(2), EventId(1)),
            Err(AuthError::NotFound(_))
        ));
        assert!(gate.authorize_mutation(&principal(1), EventId(1)).is_ok());
    }

    #[test]
    fn test_stamp_never_consults_owner() {
        let (gate, _, owners) = setup(Owners::default());

        let owned = gate.stamp(&principal(3), "draft");
        assert_eq!(owned.owner(), UserId(3));
        assert_eq!(*owned.value(), "draft");
        assert_eq!(owners.lookups.load(Ordering::SeqCst), 0);
    }
}
