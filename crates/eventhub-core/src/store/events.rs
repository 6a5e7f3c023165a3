//! Event and registration storage.

use chrono::Utc;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, abort};

use super::{OwnerLookup, StoreError, next_id};
use crate::types::{Event, EventDraft, EventId, Owned, Registration, UserId};

/// Event store backed by sled.
///
/// Events live in the `events` tree keyed by ID. Registrations live in the
/// `registrations` tree keyed by `event_id ++ user_id`, so one prefix scan
/// yields an event's attendees.
pub struct EventStore {
    db: sled::Db,
    events: sled::Tree,
    registrations: sled::Tree,
}

impl EventStore {
    pub(super) fn new(db: sled::Db) -> Result<Self, StoreError> {
        let events = db.open_tree("events")?;
        let registrations = db.open_tree("registrations")?;
        Ok(Self {
            db,
            events,
            registrations,
        })
    }

    /// List all events in ID order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        for result in self.events.iter() {
            let (_, value) = result?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    /// Get an event by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        self.events
            .get(id.to_key())?
            .map(|value| serde_json::from_slice(&value).map_err(StoreError::from))
            .transpose()
    }

    /// Create an event owned by the stamped principal.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn create(&self, draft: Owned<EventDraft>) -> Result<Event, StoreError> {
        let (owner, draft) = draft.into_parts();
        let event = Event {
            id: EventId(next_id(&self.db)?),
            name: draft.name,
            description: draft.description,
            location: draft.location,
            date_time: draft.date_time,
            user_id: owner,
        };

        self.events
            .insert(event.id.to_key(), serde_json::to_vec(&event)?)?;
        self.events.flush()?;

        tracing::info!(event_id = %event.id, user_id = %owner, "Event created");
        Ok(event)
    }

    /// Replace an event's fields. The owner is never changed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the event does not exist.
    pub fn update(&self, id: EventId, draft: EventDraft) -> Result<Event, StoreError> {
        let key = id.to_key();

        // Compare-and-swap so a concurrent delete is never resurrected.
        loop {
            let current = self
                .events
                .get(key)?
                .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;
            let existing: Event = serde_json::from_slice(&current)?;

            let updated = Event {
                id,
                name: draft.name.clone(),
                description: draft.description.clone(),
                location: draft.location.clone(),
                date_time: draft.date_time,
                user_id: existing.user_id,
            };
            let value = serde_json::to_vec(&updated)?;

            if self
                .events
                .compare_and_swap(key, Some(&current), Some(value))?
                .is_ok()
            {
                self.events.flush()?;
                tracing::info!(event_id = %id, "Event updated");
                return Ok(updated);
            }
        }
    }

    /// Delete an event and its registrations.
    ///
    /// Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: EventId) -> Result<bool, StoreError> {
        let key = id.to_key();
        let removed = self
            .events
            .transaction(|events| {
                Ok::<_, ConflictableTransactionError<StoreError>>(
                    events.remove(&key[..])?.is_some(),
                )
            })?;

        // `register` checks the event inside its transaction, so nothing can
        // be added under this prefix once the removal has committed.
        for result in self.registrations.scan_prefix(key) {
            let (key, _) = result?;
            self.registrations.remove(key)?;
        }

        self.events.flush()?;
        self.registrations.flush()?;

        if removed {
            tracing::info!(event_id = %id, "Event deleted");
        }
        Ok(removed)
    }

    /// Register a user for an event. Registering twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the event does not exist.
    pub fn register(&self, event_id: EventId, user_id: UserId) -> Result<Registration, StoreError> {
        let event_key = event_id.to_key();
        let key = registration_key(event_id, user_id);

        let (registration, created) = (&self.events, &self.registrations).transaction(
            |(events, registrations)| {
                if events.get(&event_key[..])?.is_none() {
                    return abort(StoreError::NotFound(format!("event {event_id}")));
                }

                if let Some(existing) = registrations.get(&key[..])? {
                    let existing: Registration = serde_json::from_slice(&existing)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    return Ok((existing, false));
                }

                let registration = Registration {
                    event_id,
                    user_id,
                    registered_at: Utc::now(),
                };
                let value = serde_json::to_vec(&registration)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                registrations.insert(&key[..], value)?;
                Ok((registration, true))
            },
        )?;

        if created {
            self.registrations.flush()?;
            tracing::info!(event_id = %event_id, user_id = %user_id, "Registered for event");
        }
        Ok(registration)
    }

    /// Cancel a registration. Returns `false` if the user was not registered.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the event does not exist.
    pub fn unregister(&self, event_id: EventId, user_id: UserId) -> Result<bool, StoreError> {
        if !self.events.contains_key(event_id.to_key())? {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }

        let removed = self
            .registrations
            .remove(registration_key(event_id, user_id))?
            .is_some();
        self.registrations.flush()?;

        if removed {
            tracing::info!(event_id = %event_id, user_id = %user_id, "Registration cancelled");
        }
        Ok(removed)
    }

    /// All registrations for an event.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn registrations(&self, event_id: EventId) -> Result<Vec<Registration>, StoreError> {
        let mut registrations = Vec::new();
        for result in self.registrations.scan_prefix(event_id.to_key()) {
            let (_, value) = result?;
            registrations.push(serde_json::from_slice(&value)?);
        }
        Ok(registrations)
    }
}

impl OwnerLookup for EventStore {
    fn find_owner(&self, event_id: EventId) -> Result<Option<UserId>, StoreError> {
        Ok(self.get(event_id)?.map(|event| event.user_id))
    }
}

fn registration_key(event_id: EventId, user_id: UserId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&event_id.to_key());
    key[8..].copy_from_slice(&user_id.to_key());
    key
}
