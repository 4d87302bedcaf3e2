//! Authentication handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::{ChangePasswordRequest, CurrentUser, TokenPair};
use crate::user::{CreateUserRequest, UserInfo};

use super::MessageResponse;
use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Refresh request. `token` is accepted for older clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(alias = "token")]
    pub refresh_token: Option<String>,
}

/// Refresh response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Verify response.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub identity: UserInfo,
}

/// Register a new identity.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let user = state.auth_service().signup(request).await?;
    info!(user_id = %user.id, "User signed up");
    Ok((StatusCode::CREATED, MessageResponse::new("User created successfully")))
}

/// Exchange credentials for an access and a refresh token.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state
        .auth_service()
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(pair))
}

/// Mint a new access token from a refresh token. A request without a
/// body is answered like one without a token.
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Option<ApiJson<RefreshRequest>>,
) -> ApiResult<Json<RefreshResponse>> {
    let refresh_token = body.and_then(|ApiJson(request)| request.refresh_token);
    let access_token = state
        .auth_service()
        .refresh_access_token(refresh_token.as_deref())
        .await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// Return the identity behind the bearer token.
pub async fn verify(user: CurrentUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        identity: user.user,
    })
}

/// Change the caller's password.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth_service()
        .change_password(user.id(), request)
        .await?;
    Ok(MessageResponse::new("Password updated successfully"))
}
