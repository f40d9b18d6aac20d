//! Dashboard route.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::report::ReportFilters;
use crate::services::dashboard::{self, DashboardSummary};
use crate::AppState;

/// GET /api/v1/dashboard/summary: totals, per-assembly ranking and health score.
pub async fn summary(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ApiResponse<DashboardSummary>>, AppError> {
    let summary = dashboard::get_summary(&state.db, &filters).await?;
    Ok(ApiResponse::success(summary))
}
