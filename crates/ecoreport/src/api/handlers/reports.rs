//! Contamination report handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::auth::{CurrentUser, authorize_mutation};
use crate::content::{
    AddImageRequest, ContaminationReport, ContentListQuery, CreateReportRequest, Page,
    UpdateReportRequest,
};

use super::MessageResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

async fn load(state: &AppState, id: &str) -> ApiResult<ContaminationReport> {
    state
        .reports
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Report {} not found", id)))
}

#[instrument(skip(state))]
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Page<ContaminationReport>>> {
    Ok(Json(state.reports.list(&query).await?))
}

#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContaminationReport>> {
    Ok(Json(load(&state, &id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<ContaminationReport>)> {
    let report = state.reports.create(user.id(), request).await?;
    info!(report_id = %report.id, "Created report");
    Ok((StatusCode::CREATED, Json(report)))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn update_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateReportRequest>,
) -> ApiResult<Json<ContaminationReport>> {
    let report = load(&state, &id).await?;
    authorize_mutation(&user, &report)?;
    Ok(Json(state.reports.update(&id, request).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let report = load(&state, &id).await?;
    authorize_mutation(&user, &report)?;
    state.reports.delete(&id).await?;
    info!(report_id = %id, "Deleted report");
    Ok(MessageResponse::new("Deleted"))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn add_report_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddImageRequest>,
) -> ApiResult<Json<ContaminationReport>> {
    let report = load(&state, &id).await?;
    authorize_mutation(&user, &report)?;
    let image = request.into_image()?;
    Ok(Json(state.reports.add_image(&id, image).await?))
}
