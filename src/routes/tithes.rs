//! Tithe sheet routes: save, list, summary and spreadsheet import.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::rbac::{self, RequireSubmitter};
use crate::models::tithe::{SaveTitheSheet, TitheRecord, TitheSheetSummary};
use crate::services::tithe::{self as tithe_service, SheetFormat, TitheImportResult};
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct TitheQuery {
    pub assembly: Option<String>,
    pub month: Option<String>,
}

impl TitheQuery {
    fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn month(&self) -> Option<&str> {
        self.month.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// GET /api/v1/tithes: member rows, optionally filtered by assembly and month.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<TitheQuery>,
) -> Result<Json<ApiResponse<Vec<TitheRecord>>>, AppError> {
    let records = tithe_service::list(&state.db, query.assembly(), query.month()).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/v1/tithes: replace the sheet for one assembly and month.
pub async fn save(
    State(state): State<AppState>,
    RequireSubmitter(user): RequireSubmitter,
    Json(body): Json<SaveTitheSheet>,
) -> Result<Json<ApiResponse<Vec<TitheRecord>>>, AppError> {
    rbac::ensure_assembly_access(&user, &body.assembly)?;
    let records = tithe_service::save_sheet(&state.db, &body).await?;
    Ok(ApiResponse::success(records))
}

/// GET /api/v1/tithes/summary: row and column totals.
pub async fn summary(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<TitheQuery>,
) -> Result<Json<ApiResponse<TitheSheetSummary>>, AppError> {
    let records = tithe_service::list(&state.db, query.assembly(), query.month()).await?;
    let summary = tithe_service::summarize_sheet(query.assembly(), query.month(), &records);
    Ok(ApiResponse::success(summary))
}

/// POST /api/v1/tithes/import: upload a CSV/XLSX sheet (multipart: file, assembly, month).
pub async fn import(
    State(state): State<AppState>,
    RequireSubmitter(user): RequireSubmitter,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<TitheImportResult>>, AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut assembly: Option<String> = None;
    let mut month: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?
                        .to_vec(),
                );
            }
            "assembly" | "month" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
                if name == "assembly" {
                    assembly = Some(text.trim().to_string());
                } else {
                    month = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| {
        AppError::Validation("Missing 'file' field in multipart request".to_string())
    })?;
    let assembly = assembly
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing 'assembly' field".to_string()))?;
    let month = month
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing 'month' field".to_string()))?;
    let fname = filename.unwrap_or_default();
    let format = SheetFormat::from_filename(&fname).ok_or_else(|| {
        AppError::Validation(format!(
            "Unsupported file type '{fname}'. Upload a .csv or .xlsx sheet"
        ))
    })?;

    rbac::ensure_assembly_access(&user, &assembly)?;
    let result = tithe_service::import_sheet(&state.db, &assembly, &month, &data, &format).await?;

    tracing::info!(
        assembly = %assembly,
        month = %month,
        imported = result.imported,
        skipped = result.skipped,
        errors = result.errors.len(),
        "Tithe sheet imported"
    );
    Ok(ApiResponse::success(result))
}
