//! Event handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::auth::{CurrentUser, authorize_mutation};
use crate::content::{
    AddImageRequest, AddParticipantRequest, ContentListQuery, CreateEventRequest, Event, Page,
    UpdateEventRequest,
};

use super::MessageResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

async fn load(state: &AppState, id: &str) -> ApiResult<Event> {
    state
        .events
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Event {} not found", id)))
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Page<Event>>> {
    Ok(Json(state.events.list(&query).await?))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Event>> {
    Ok(Json(load(&state, &id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.events.create(user.id(), request).await?;
    info!(event_id = %event.id, "Created event");
    Ok((StatusCode::CREATED, Json(event)))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn update_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    let event = load(&state, &id).await?;
    authorize_mutation(&user, &event)?;
    Ok(Json(state.events.update(&id, request).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let event = load(&state, &id).await?;
    authorize_mutation(&user, &event)?;
    state.events.delete(&id).await?;
    info!(event_id = %id, "Deleted event");
    Ok(MessageResponse::new("Deleted"))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn add_event_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddImageRequest>,
) -> ApiResult<Json<Event>> {
    let event = load(&state, &id).await?;
    authorize_mutation(&user, &event)?;
    let image = request.into_image()?;
    Ok(Json(state.events.add_image(&id, image).await?))
}

/// Sign up for an event. Registering someone else needs an elevated role.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn add_participant(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddParticipantRequest>,
) -> ApiResult<Json<Event>> {
    let participant = request
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| user.id().to_string());

    if participant != user.id() && !user.is_elevated() {
        return Err(ApiError::forbidden(
            "only moderators and administrators may register other users",
        ));
    }

    load(&state, &id).await?;
    if participant != user.id() && state.users.find_user(&participant).await?.is_none() {
        return Err(ApiError::not_found(format!("User {} not found", participant)));
    }

    Ok(Json(state.events.add_participant(&id, &participant).await?))
}
