//! Period aggregation, per-assembly performance and the 1-10 financial health score.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::report::Report;
use crate::services::totals::{self, CategoryTotals};

const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 10;
const NEUTRAL_SCORE: i32 = 5;

/// District-wide (or filtered) totals for a reporting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub report_count: usize,
    pub service_count: usize,
    pub total_income: Decimal,
    pub total_tithes: Decimal,
    pub total_offerings: Decimal,
    pub total_attendance: i64,
    pub average_attendance: Decimal,
    pub tithe_percentage: Decimal,
    pub categories: CategoryTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyPerformance {
    pub rank: usize,
    pub assembly: String,
    pub report_count: usize,
    pub service_count: usize,
    pub total_income: Decimal,
    pub total_tithes: Decimal,
    pub total_attendance: i64,
    pub average_attendance: Decimal,
    pub income_per_attendee: Decimal,
    pub tithe_percentage: Decimal,
    /// Share of the summed income across all assemblies in the input.
    pub share_of_income: Decimal,
}

/// Inputs to the health score, all derived from summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub total_income: Decimal,
    pub tithe_percentage: Decimal,
    pub income_per_attendee: Decimal,
    pub income_growth: Option<Decimal>,
    pub attendance_growth: Option<Decimal>,
    pub active_categories: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            8.. => Self::Excellent,
            6..=7 => Self::Good,
            4..=5 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

impl std::fmt::Display for HealthRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialHealth {
    pub score: u8,
    pub rating: HealthRating,
    pub metrics: HealthMetrics,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
}

pub fn summarize(reports: &[Report]) -> PeriodSummary {
    let mut summary = PeriodSummary {
        report_count: reports.len(),
        ..Default::default()
    };

    for report in reports {
        summary.service_count += report.records.0.len();
        summary.total_income += report.total_income;
        summary.total_tithes += report.total_tithes;
        summary.total_attendance += report.total_attendance;
        for record in &report.records.0 {
            summary.categories.add(record);
        }
    }

    summary.total_offerings = summary.total_income - summary.total_tithes;
    summary.average_attendance = average(summary.total_attendance, summary.service_count);
    summary.tithe_percentage = totals::percentage(summary.total_tithes, summary.total_income);
    summary
}

/// Rank assemblies by income (descending, ties by name).
pub fn analyze_assembly_performance(reports: &[Report]) -> Vec<AssemblyPerformance> {
    let mut grouped: BTreeMap<&str, Vec<&Report>> = BTreeMap::new();
    for report in reports {
        grouped.entry(report.assembly.as_str()).or_default().push(report);
    }

    let district_income: Decimal = reports.iter().map(|r| r.total_income).sum();

    let mut rows: Vec<AssemblyPerformance> = grouped
        .into_iter()
        .map(|(assembly, items)| {
            let service_count: usize = items.iter().map(|r| r.records.0.len()).sum();
            let total_income: Decimal = items.iter().map(|r| r.total_income).sum();
            let total_tithes: Decimal = items.iter().map(|r| r.total_tithes).sum();
            let total_attendance: i64 = items.iter().map(|r| r.total_attendance).sum();

            AssemblyPerformance {
                rank: 0,
                assembly: assembly.to_string(),
                report_count: items.len(),
                service_count,
                total_income,
                total_tithes,
                total_attendance,
                average_attendance: average(total_attendance, service_count),
                income_per_attendee: totals::ratio(total_income, Decimal::from(total_attendance)),
                tithe_percentage: totals::percentage(total_tithes, total_income),
                share_of_income: totals::percentage(total_income, district_income),
            }
        })
        .collect();

    // BTreeMap order already sorts by name, so a stable sort keeps ties alphabetical.
    rows.sort_by(|a, b| b.total_income.cmp(&a.total_income));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

/// Percentage change from `previous` to `current`; `None` without a baseline.
pub fn growth_rate(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous <= Decimal::ZERO {
        return None;
    }
    Some(
        ((current - previous) / previous * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
    )
}

pub fn health_metrics(current: &PeriodSummary, previous: Option<&PeriodSummary>) -> HealthMetrics {
    HealthMetrics {
        total_income: current.total_income,
        tithe_percentage: current.tithe_percentage,
        income_per_attendee: totals::ratio(
            current.total_income,
            Decimal::from(current.total_attendance),
        ),
        income_growth: previous.and_then(|p| growth_rate(current.total_income, p.total_income)),
        attendance_growth: previous.and_then(|p| {
            growth_rate(
                Decimal::from(current.total_attendance),
                Decimal::from(p.total_attendance),
            )
        }),
        active_categories: current.categories.active_categories(),
    }
}

/// Thresholded score, clamped to 1..=10. No income at all scores 1.
pub fn calculate_financial_health_score(m: &HealthMetrics) -> u8 {
    if m.total_income <= Decimal::ZERO {
        return MIN_SCORE as u8;
    }

    let mut score = NEUTRAL_SCORE;

    if m.tithe_percentage >= Decimal::from(50) {
        score += 2;
    } else if m.tithe_percentage >= Decimal::from(30) {
        score += 1;
    } else if m.tithe_percentage < Decimal::from(15) {
        score -= 1;
    }

    if m.income_per_attendee >= Decimal::from(50) {
        score += 1;
    } else if m.income_per_attendee < Decimal::from(10) {
        score -= 1;
    }

    if let Some(growth) = m.income_growth {
        if growth > Decimal::from(10) {
            score += 2;
        } else if growth > Decimal::ZERO {
            score += 1;
        } else if growth < Decimal::from(-10) {
            score -= 2;
        }
    }

    if let Some(growth) = m.attendance_growth {
        if growth > Decimal::from(5) {
            score += 1;
        } else if growth < Decimal::from(-5) {
            score -= 1;
        }
    }

    if m.active_categories >= 5 {
        score += 1;
    }

    score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

pub fn analyze_financial_health(
    current: &PeriodSummary,
    previous: Option<&PeriodSummary>,
) -> FinancialHealth {
    let metrics = health_metrics(current, previous);
    let score = calculate_financial_health_score(&metrics);
    let mut strengths = Vec::new();
    let mut concerns = Vec::new();

    if current.total_income.is_zero() {
        concerns.push("No income was recorded for this period".to_string());
    }
    if metrics.tithe_percentage >= Decimal::from(50) {
        strengths.push(format!(
            "Tithes make up {}% of income, a strong faithful-giving base",
            metrics.tithe_percentage
        ));
    } else if !current.total_income.is_zero() && metrics.tithe_percentage < Decimal::from(15) {
        concerns.push(format!(
            "Tithes are only {}% of income",
            metrics.tithe_percentage
        ));
    }

    match metrics.income_growth {
        Some(g) if g > Decimal::ZERO => {
            strengths.push(format!("Income grew {g}% over the previous period"))
        }
        Some(g) if g < Decimal::from(-10) => {
            concerns.push(format!("Income fell {}% from the previous period", g.abs()))
        }
        _ => {}
    }

    match metrics.attendance_growth {
        Some(g) if g > Decimal::from(5) => {
            strengths.push(format!("Attendance grew {g}% over the previous period"))
        }
        Some(g) if g < Decimal::from(-5) => {
            concerns.push(format!("Attendance dropped {}% from the previous period", g.abs()))
        }
        _ => {}
    }

    if metrics.active_categories >= 5 {
        strengths.push(format!(
            "Giving is spread across {} income categories",
            metrics.active_categories
        ));
    } else if metrics.active_categories > 0 && metrics.active_categories <= 2 {
        concerns.push("Income depends on very few giving categories".to_string());
    }

    FinancialHealth {
        score,
        rating: HealthRating::from_score(score),
        metrics,
        strengths,
        concerns,
    }
}

fn average(total: i64, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(total) / Decimal::from(count as u64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::report::{Attendance, ServiceRecord, ServiceType};
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    /// Build a normalised report the way the submit path stores it.
    pub(crate) fn report(assembly: &str, month: &str, weeks: &[(i64, i64, u32)]) -> Report {
        let records: Vec<ServiceRecord> = weeks
            .iter()
            .enumerate()
            .map(|(i, &(tithes, offerings, people))| {
                totals::normalize_record(ServiceRecord {
                    week: (i + 1) as u8,
                    attendance: Attendance {
                        men: people / 2,
                        women: people - people / 2,
                        ..Default::default()
                    },
                    tithes: Decimal::from(tithes),
                    offerings: Decimal::from(offerings),
                    ..Default::default()
                })
                .unwrap()
            })
            .collect();
        let t = totals::report_totals(&records).unwrap();
        Report {
            id: Uuid::new_v4(),
            assembly: assembly.to_string(),
            month: month.to_string(),
            service_type: ServiceType::Sunday,
            submitted_by: "secretary".to_string(),
            records: Json(records),
            total_income: t.total_income,
            total_tithes: t.total_tithes,
            total_attendance: t.total_attendance as i64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_income_equals_sum_of_report_totals() {
        let reports = vec![
            report("Bethel", "2026-03", &[(500, 200, 80), (450, 150, 70)]),
            report("Zion", "2026-03", &[(300, 100, 40)]),
        ];
        let summary = summarize(&reports);
        let expected: Decimal = reports.iter().map(|r| r.total_income).sum();
        assert_eq!(summary.total_income, expected);
        assert_eq!(summary.total_income, Decimal::from(1700));
        assert_eq!(summary.total_tithes, Decimal::from(1250));
        assert_eq!(summary.total_offerings, Decimal::from(450));
        assert_eq!(summary.service_count, 3);
        assert_eq!(summary.total_attendance, 190);
        assert_eq!(summary.average_attendance, Decimal::new(633, 1));
        assert_eq!(summary.tithe_percentage, Decimal::new(735, 1));
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.average_attendance, Decimal::ZERO);
        assert_eq!(summary.tithe_percentage, Decimal::ZERO);
    }

    #[test]
    fn performance_is_ranked_by_income() {
        let reports = vec![
            report("Zion", "2026-03", &[(300, 100, 40)]),
            report("Bethel", "2026-03", &[(500, 200, 80)]),
            report("Bethel", "2026-02", &[(100, 0, 20)]),
            report("Agape", "2026-03", &[(300, 100, 50)]),
        ];
        let rows = analyze_assembly_performance(&reports);
        let names: Vec<_> = rows.iter().map(|r| r.assembly.as_str()).collect();
        assert_eq!(names, ["Bethel", "Agape", "Zion"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].report_count, 2);
        assert_eq!(rows[0].total_income, Decimal::from(800));
        assert_eq!(rows[0].income_per_attendee, Decimal::from(8));
        assert_eq!(rows[0].share_of_income, Decimal::from(50));

        let shares: Decimal = rows.iter().map(|r| r.share_of_income).sum();
        assert_eq!(shares, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn growth_rate_needs_baseline() {
        assert_eq!(growth_rate(Decimal::from(110), Decimal::ZERO), None);
        assert_eq!(
            growth_rate(Decimal::from(110), Decimal::from(100)),
            Some(Decimal::from(10))
        );
        assert_eq!(
            growth_rate(Decimal::from(75), Decimal::from(100)),
            Some(Decimal::from(-25))
        );
    }

    #[test]
    fn score_is_one_without_income() {
        assert_eq!(calculate_financial_health_score(&HealthMetrics::default()), 1);
    }

    #[test]
    fn score_clamps_at_ten_for_extreme_inputs() {
        let metrics = HealthMetrics {
            total_income: Decimal::from(1_000_000_000),
            tithe_percentage: Decimal::ONE_HUNDRED,
            income_per_attendee: Decimal::from(1_000_000),
            income_growth: Some(Decimal::from(10_000)),
            attendance_growth: Some(Decimal::from(500)),
            active_categories: 11,
        };
        assert_eq!(calculate_financial_health_score(&metrics), 10);
    }

    #[test]
    fn score_clamps_at_one_for_collapse() {
        let metrics = HealthMetrics {
            total_income: Decimal::new(1, 2),
            tithe_percentage: Decimal::ZERO,
            income_per_attendee: Decimal::ZERO,
            income_growth: Some(Decimal::from(-99)),
            attendance_growth: Some(Decimal::from(-90)),
            active_categories: 1,
        };
        assert_eq!(calculate_financial_health_score(&metrics), 1);
    }

    #[test]
    fn score_within_bounds_for_mixed_inputs() {
        for tithe in [0, 14, 15, 30, 50, 100] {
            for growth in [None, Some(-50), Some(0), Some(5), Some(50)] {
                let metrics = HealthMetrics {
                    total_income: Decimal::from(1000),
                    tithe_percentage: Decimal::from(tithe),
                    income_per_attendee: Decimal::from(20),
                    income_growth: growth.map(Decimal::from),
                    attendance_growth: growth.map(Decimal::from),
                    active_categories: 3,
                };
                let score = calculate_financial_health_score(&metrics);
                assert!((1..=10).contains(&score));
            }
        }
    }

    #[test]
    fn health_reports_growth_against_previous_period() {
        let previous = summarize(&[report("Bethel", "2026-02", &[(400, 100, 100)])]);
        let current = summarize(&[report("Bethel", "2026-03", &[(600, 150, 120)])]);
        let health = analyze_financial_health(&current, Some(&previous));

        assert_eq!(health.metrics.income_growth, Some(Decimal::from(50)));
        assert_eq!(health.metrics.attendance_growth, Some(Decimal::from(20)));
        // 5 + 2 (tithes 80%) - 1 (6.25 per attendee) + 2 (income) + 1 (attendance)
        assert_eq!(health.score, 9);
        assert_eq!(health.rating, HealthRating::Excellent);
        assert!(health.strengths.iter().any(|s| s.contains("Income grew 50")));
    }

    #[test]
    fn rating_bands() {
        assert_eq!(HealthRating::from_score(10), HealthRating::Excellent);
        assert_eq!(HealthRating::from_score(6), HealthRating::Good);
        assert_eq!(HealthRating::from_score(4), HealthRating::Fair);
        assert_eq!(HealthRating::from_score(1), HealthRating::Poor);
    }
}
