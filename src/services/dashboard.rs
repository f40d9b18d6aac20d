//! Dashboard aggregation over stored reports.

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::report::ReportFilters;
use crate::services::ai_report::AnalysisContext;
use crate::services::analysis::{self, AssemblyPerformance, FinancialHealth, PeriodSummary};
use crate::services::{period, report};

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub filters: ReportFilters,
    pub summary: PeriodSummary,
    pub assemblies: Vec<AssemblyPerformance>,
    pub health: FinancialHealth,
    pub previous_period: Option<PeriodSummary>,
}

/// Filters for the comparison period: the previous month when a month is
/// selected, the previous year when only a year is.
pub fn previous_filters(filters: &ReportFilters) -> Result<Option<ReportFilters>, AppError> {
    match (&filters.month, filters.year) {
        (Some(month), _) => {
            let previous = period::previous_month(month)?;
            Ok(Some(ReportFilters {
                month: Some(previous),
                year: None,
                ..filters.clone()
            }))
        }
        (None, Some(year)) => {
            let previous = year
                .checked_sub(1)
                .ok_or_else(|| AppError::Validation(format!("Year {year} has no previous year")))?;
            Ok(Some(ReportFilters {
                year: Some(previous),
                ..filters.clone()
            }))
        }
        (None, None) => Ok(None),
    }
}

/// Load the selected and comparison periods and run every analysis over them.
pub async fn build_context(
    pool: &PgPool,
    filters: &ReportFilters,
) -> Result<AnalysisContext, AppError> {
    let filters = report::normalize_filters(filters)?;
    let previous_filters = previous_filters(&filters)?;

    let (current, previous) = tokio::try_join!(
        report::load_for_period(pool, &filters),
        load_optional(pool, previous_filters.as_ref()),
    )?;

    let summary = analysis::summarize(&current);
    // An empty comparison period has nothing to grow from.
    let previous = previous
        .filter(|reports| !reports.is_empty())
        .map(|reports| analysis::summarize(&reports));
    let assemblies = analysis::analyze_assembly_performance(&current);
    let health = analysis::analyze_financial_health(&summary, previous.as_ref());

    tracing::debug!(
        reports = current.len(),
        has_previous = previous.is_some(),
        score = health.score,
        "Dashboard context built"
    );

    Ok(AnalysisContext {
        filters,
        summary,
        previous,
        assemblies,
        health,
    })
}

async fn load_optional(
    pool: &PgPool,
    filters: Option<&ReportFilters>,
) -> Result<Option<Vec<crate::models::report::Report>>, AppError> {
    match filters {
        Some(f) => Ok(Some(report::load_for_period(pool, f).await?)),
        None => Ok(None),
    }
}

pub async fn get_summary(
    pool: &PgPool,
    filters: &ReportFilters,
) -> Result<DashboardSummary, AppError> {
    let ctx = build_context(pool, filters).await?;
    Ok(DashboardSummary {
        filters: ctx.filters,
        summary: ctx.summary,
        assemblies: ctx.assemblies,
        health: ctx.health,
        previous_period: ctx.previous,
    })
}
