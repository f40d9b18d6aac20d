//! Service report routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::rbac::{self, RequireSubmitter};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::report::{Report, ReportFilters, ReportSummary, SubmitReport};
use crate::services::report as report_service;
use crate::AppState;

/// GET /api/v1/reports: list report summaries with filters and pagination.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ApiResponse<PagedResult<ReportSummary>>>, AppError> {
    let result = report_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/reports: submit or resubmit a monthly report (secretary/admin).
pub async fn submit(
    State(state): State<AppState>,
    RequireSubmitter(user): RequireSubmitter,
    Json(body): Json<SubmitReport>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    rbac::ensure_assembly_access(&user, &body.assembly)?;
    let report = report_service::submit(&state.db, &body, &user.username).await?;
    Ok(ApiResponse::success(report))
}

/// GET /api/v1/reports/{id}: full report with weekly records.
pub async fn get_by_id(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    let report = report_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(report))
}
