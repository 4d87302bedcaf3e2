//! Company handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::auth::{CurrentUser, authorize_mutation};
use crate::content::{
    AddImageRequest, Company, ContentListQuery, CreateCompanyRequest, Page, UpdateCompanyRequest,
};

use super::MessageResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

async fn load(state: &AppState, id: &str) -> ApiResult<Company> {
    state
        .companies
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Company {} not found", id)))
}

#[instrument(skip(state))]
pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Page<Company>>> {
    Ok(Json(state.companies.list(&query).await?))
}

#[instrument(skip(state))]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Company>> {
    Ok(Json(load(&state, &id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_company(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    let company = state.companies.create(user.id(), request).await?;
    info!(company_id = %company.id, "Created company");
    Ok((StatusCode::CREATED, Json(company)))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn update_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateCompanyRequest>,
) -> ApiResult<Json<Company>> {
    let company = load(&state, &id).await?;
    authorize_mutation(&user, &company)?;
    Ok(Json(state.companies.update(&id, request).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let company = load(&state, &id).await?;
    authorize_mutation(&user, &company)?;
    state.companies.delete(&id).await?;
    info!(company_id = %id, "Deleted company");
    Ok(MessageResponse::new("Deleted"))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn add_company_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddImageRequest>,
) -> ApiResult<Json<Company>> {
    let company = load(&state, &id).await?;
    authorize_mutation(&user, &company)?;
    let image = request.into_image()?;
    Ok(Json(state.companies.add_image(&id, image).await?))
}
