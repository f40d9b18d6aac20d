//! Service report submission and retrieval.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::report::{Report, ReportFilters, ReportSummary, ServiceRecord, SubmitReport};
use crate::services::{assembly, period, totals};

/// Shared WHERE clause; binds are assembly, month, year, service type in that order.
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR assembly = $1)
      AND ($2::text IS NULL OR month = $2)
      AND ($3::int IS NULL OR LEFT(month, 4)::int = $3)
      AND ($4::service_type IS NULL OR service_type = $4)
"#;

/// Trim filters and reject malformed month labels before they reach SQL.
pub fn normalize_filters(filters: &ReportFilters) -> Result<ReportFilters, AppError> {
    let assembly = filters
        .assembly
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let month = match filters.month.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(m) => {
            period::parse_month(m)?;
            Some(m.to_string())
        }
        None => None,
    };
    if let Some(year) = filters.year {
        period::check_year(year)?;
    }
    if let (Some(m), Some(year)) = (&month, filters.year) {
        if !m.starts_with(&format!("{year:04}-")) {
            return Err(AppError::Validation(format!(
                "Month '{m}' is not in year {year}"
            )));
        }
    }
    Ok(ReportFilters {
        assembly,
        month,
        year: filters.year,
        service_type: filters.service_type,
    })
}

/// Validate and normalise every record, returning them ordered by week.
pub fn prepare_records(records: &[ServiceRecord]) -> Result<Vec<ServiceRecord>, AppError> {
    let mut prepared = Vec::with_capacity(records.len());
    for record in records {
        totals::validate_record(record)?;
        prepared.push(totals::normalize_record(record.clone())?);
    }
    prepared.sort_by_key(|r| r.week);
    if prepared.windows(2).any(|w| w[0].week == w[1].week) {
        return Err(AppError::Validation(
            "Each week may appear only once in a report".to_string(),
        ));
    }
    Ok(prepared)
}

/// Store a report snapshot, replacing any earlier submission for the same
/// assembly, month and service type.
pub async fn submit(
    pool: &PgPool,
    input: &SubmitReport,
    submitted_by: &str,
) -> Result<Report, AppError> {
    input.validate()?;
    period::parse_month(&input.month)?;
    let assembly = assembly::require_active(pool, &input.assembly).await?;
    let records = prepare_records(&input.records)?;
    let sums = totals::report_totals(&records)?;
    let total_attendance = i64::try_from(sums.total_attendance)
        .map_err(|_| AppError::Validation("Attendance total is too large".to_string()))?;

    let report = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (assembly, month, service_type, submitted_by, records,
            total_income, total_tithes, total_attendance)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (assembly, month, service_type) DO UPDATE SET
            submitted_by = EXCLUDED.submitted_by,
            records = EXCLUDED.records,
            total_income = EXCLUDED.total_income,
            total_tithes = EXCLUDED.total_tithes,
            total_attendance = EXCLUDED.total_attendance,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(&assembly.name)
    .bind(input.month.trim())
    .bind(input.service_type)
    .bind(submitted_by)
    .bind(Json(&records))
    .bind(sums.total_income)
    .bind(sums.total_tithes)
    .bind(total_attendance)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        report_id = %report.id,
        assembly = %report.assembly,
        month = %report.month,
        service_type = report.service_type.as_str(),
        total_income = %report.total_income,
        "Report submitted"
    );

    Ok(report)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Report, AppError> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))
}

pub async fn list(
    pool: &PgPool,
    filters: &ReportFilters,
    pagination: &Pagination,
) -> Result<PagedResult<ReportSummary>, AppError> {
    let f = normalize_filters(filters)?;

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM reports {FILTER_CLAUSE}"
    ))
    .bind(&f.assembly)
    .bind(&f.month)
    .bind(f.year)
    .bind(f.service_type)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, ReportSummary>(&format!(
        "SELECT id, assembly, month, service_type, submitted_by, total_income, total_tithes, \
         total_attendance, updated_at FROM reports {FILTER_CLAUSE} \
         ORDER BY month DESC, assembly ASC, service_type ASC LIMIT $5 OFFSET $6"
    ))
    .bind(&f.assembly)
    .bind(&f.month)
    .bind(f.year)
    .bind(f.service_type)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Every report matching the filters, records included, for aggregation.
pub async fn load_for_period(
    pool: &PgPool,
    filters: &ReportFilters,
) -> Result<Vec<Report>, AppError> {
    let f = normalize_filters(filters)?;
    let reports = sqlx::query_as::<_, Report>(&format!(
        "SELECT * FROM reports {FILTER_CLAUSE} ORDER BY month ASC, assembly ASC"
    ))
    .bind(&f.assembly)
    .bind(&f.month)
    .bind(f.year)
    .bind(f.service_type)
    .fetch_all(pool)
    .await?;
    Ok(reports)
}
