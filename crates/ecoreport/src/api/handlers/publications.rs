//! Publication handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::auth::{CurrentUser, authorize_mutation};
use crate::content::{
    ContentListQuery, CreatePublicationRequest, Page, Publication, UpdatePublicationRequest,
};

use super::MessageResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

async fn load(state: &AppState, id: &str) -> ApiResult<Publication> {
    state
        .publications
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Publication {} not found", id)))
}

#[instrument(skip(state))]
pub async fn list_publications(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Page<Publication>>> {
    Ok(Json(state.publications.list(&query).await?))
}

#[instrument(skip(state))]
pub async fn get_publication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Publication>> {
    Ok(Json(load(&state, &id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreatePublicationRequest>,
) -> ApiResult<(StatusCode, Json<Publication>)> {
    let publication = state.publications.create(user.id(), request).await?;
    info!(publication_id = %publication.id, "Created publication");
    Ok((StatusCode::CREATED, Json(publication)))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn update_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdatePublicationRequest>,
) -> ApiResult<Json<Publication>> {
    let publication = load(&state, &id).await?;
    authorize_mutation(&user, &publication)?;
    Ok(Json(state.publications.update(&id, request).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let publication = load(&state, &id).await?;
    authorize_mutation(&user, &publication)?;
    state.publications.delete(&id).await?;
    info!(publication_id = %id, "Deleted publication");
    Ok(MessageResponse::new("Deleted"))
}
