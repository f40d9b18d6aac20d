//! Assembly registry routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::rbac::RequireAdmin;
use crate::models::assembly::{Assembly, CreateAssembly, UpdateAssembly};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::assembly::{self as assembly_service, AssemblyFilters};
use crate::AppState;

/// GET /api/v1/assemblies: list assemblies with filters and pagination.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<AssemblyFilters>,
) -> Result<Json<ApiResponse<PagedResult<Assembly>>>, AppError> {
    let result = assembly_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/assemblies: register an assembly (admin).
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<CreateAssembly>,
) -> Result<Json<ApiResponse<Assembly>>, AppError> {
    let assembly = assembly_service::create(&state.db, &body).await?;
    Ok(ApiResponse::success(assembly))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Assembly>>, AppError> {
    let assembly = assembly_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(assembly))
}

/// PUT /api/v1/assemblies/{id}: update details, status or name (admin).
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAssembly>,
) -> Result<Json<ApiResponse<Assembly>>, AppError> {
    let assembly = assembly_service::update(&state.db, id, &body).await?;
    Ok(ApiResponse::success(assembly))
}
