//! User management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::auth::CurrentUser;
use crate::content::Page;
use crate::user::{CreateUserRequest, UpdateUserRequest, UserInfo, UserListQuery};

use super::MessageResponse;
use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// List users.
#[instrument(skip(state, _user))]
pub async fn list_users(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Page<UserInfo>>> {
    let page = state.users.list_users(query).await?;
    info!(count = page.results.len(), total = page.total, "Listed users");
    Ok(Json(page))
}

/// Get a specific user.
#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    Ok(Json(state.users.get_user(&user_id).await?))
}

/// Create a new user (moderator or administrator).
#[instrument(skip(state, user, request), fields(actor = %user.id()))]
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    let created = state.users.create_user(&user, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a user (self, moderator or administrator).
#[instrument(skip(state, user, request), fields(actor = %user.id()))]
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserInfo>> {
    let updated = state.users.update_user(&user, &user_id, request).await?;
    Ok(Json(updated))
}

/// Delete a user (self, moderator or administrator).
#[instrument(skip(state, user), fields(actor = %user.id()))]
pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.users.delete_user(&user, &user_id).await?;
    Ok(MessageResponse::new("Deleted"))
}
