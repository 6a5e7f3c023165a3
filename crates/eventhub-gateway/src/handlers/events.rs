//! Event handlers.
//!
//! Protected handlers take [`RequireAuth`] before the path and body
//! extractors, so authentication is settled before anything is looked up.

use axum::{Json, extract::State, http::StatusCode};
use eventhub_core::validation::validate_event_draft;
use eventhub_core::{Event, EventDraft, EventId, Registration, StoreError};

use crate::auth::RequireAuth;
use crate::response::{ApiError, ApiJson, ApiPath, ApiResponse};
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// `GET /events`
pub async fn list_events(State(state): State<GatewayState>) -> ApiResult<Vec<Event>> {
    let events = state.events.list()?;
    Ok(ApiResponse::new("Events fetched successfully", events))
}

/// `GET /event/{event_id}`
pub async fn get_event(
    State(state): State<GatewayState>,
    ApiPath(event_id): ApiPath<EventId>,
) -> ApiResult<Event> {
    let event = state
        .events
        .get(event_id)?
        .ok_or(ApiError::EventNotFound(event_id))?;
    Ok(ApiResponse::new("Event fetched successfully", event))
}

/// `POST /event`
pub async fn create_event(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiJson(draft): ApiJson<EventDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    let draft = validate_event_draft(draft)?;
    let owned = state.auth.gate().stamp(auth.principal(), draft);
    let event = state.events.create(owned)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new("Event created successfully", event),
    ))
}

/// `PUT /event/{event_id}`
pub async fn update_event(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiPath(event_id): ApiPath<EventId>,
    ApiJson(draft): ApiJson<EventDraft>,
) -> ApiResult<Event> {
    state
        .auth
        .gate()
        .authorize_mutation(auth.principal(), event_id)?;
    let draft = validate_event_draft(draft)?;

    let event = state
        .events
        .update(event_id, draft)
        .map_err(|e| event_error(e, event_id))?;
    Ok(ApiResponse::new("Event updated successfully", event))
}

/// `DELETE /event/{event_id}`
pub async fn delete_event(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiPath(event_id): ApiPath<EventId>,
) -> ApiResult<()> {
    state
        .auth
        .gate()
        .authorize_mutation(auth.principal(), event_id)?;

    if !state.events.delete(event_id)? {
        // Deleted concurrently after the ownership check.
        return Err(ApiError::EventNotFound(event_id));
    }
    Ok(ApiResponse::message("Event deleted successfully"))
}

/// `POST /event/{event_id}/register`
pub async fn register(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiPath(event_id): ApiPath<EventId>,
) -> Result<(StatusCode, Json<ApiResponse<Registration>>), ApiError> {
    let registration = state
        .events
        .register(event_id, auth.user_id())
        .map_err(|e| event_error(e, event_id))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new("Registered for event", registration),
    ))
}

/// `DELETE /event/{event_id}/register`
pub async fn unregister(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiPath(event_id): ApiPath<EventId>,
) -> ApiResult<()> {
    let removed = state
        .events
        .unregister(event_id, auth.user_id())
        .map_err(|e| event_error(e, event_id))?;

    let message = if removed {
        "Registration cancelled"
    } else {
        "Not registered for event"
    };
    Ok(ApiResponse::message(message))
}

/// `GET /event/{event_id}/registrations`, owner only.
pub async fn list_registrations(
    State(state): State<GatewayState>,
    auth: RequireAuth,
    ApiPath(event_id): ApiPath<EventId>,
) -> ApiResult<Vec<Registration>> {
    state
        .auth
        .gate()
        .authorize_mutation(auth.principal(), event_id)?;

    let registrations = state.events.registrations(event_id)?;
    Ok(ApiResponse::new(
        "Registrations fetched successfully",
        registrations,
    ))
}

fn event_error(e: StoreError, event_id: EventId) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::EventNotFound(event_id),
        other => other.into(),
    }
}
