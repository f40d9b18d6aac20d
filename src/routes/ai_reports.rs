//! AI-assisted report generation route.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::report::ReportFilters;
use crate::services::ai_report::{self, GeneratedReport, ReportKind};
use crate::services::dashboard;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub filters: ReportFilters,
    #[serde(default)]
    pub kind: ReportKind,
}

/// POST /api/v1/ai-reports/generate: always answers with a report; the
/// `source` field says whether it came from the model, the cache or the template.
pub async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<ApiResponse<GeneratedReport>>, AppError> {
    let ctx = dashboard::build_context(&state.db, &body.filters).await?;
    let report =
        ai_report::generate_ai_analysis(state.llm.as_ref(), state.cache.as_ref(), &ctx, body.kind)
            .await;

    tracing::info!(
        username = %user.username,
        kind = body.kind.as_str(),
        source = ?report.source,
        period = %report.period,
        "AI report generated"
    );
    Ok(ApiResponse::success(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_flattened_filters() {
        let body: GenerateRequest = serde_json::from_str(
            r#"{"assembly":"Bethel","month":"2026-03","serviceType":"sunday","kind":"narrative"}"#,
        )
        .unwrap();
        assert_eq!(body.kind, ReportKind::Narrative);
        assert_eq!(body.filters.assembly.as_deref(), Some("Bethel"));
        assert_eq!(body.filters.month.as_deref(), Some("2026-03"));
    }

    #[test]
    fn kind_defaults_to_analysis() {
        let body: GenerateRequest = serde_json::from_str(r#"{"year":2026}"#).unwrap();
        assert_eq!(body.kind, ReportKind::Analysis);
        assert_eq!(body.filters.year, Some(2026));
    }
}
