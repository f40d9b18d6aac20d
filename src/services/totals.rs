//! Row and column sums for service records.
//!
//! A record's `total` is always `tithes + offering_total()`; tithes are never
//! counted a second time through the offering categories.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::report::ServiceRecord;

/// Weeks a month can span.
const WEEK_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Aggregate sums for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub total_income: Decimal,
    pub total_tithes: Decimal,
    pub total_offerings: Decimal,
    pub total_attendance: u64,
}

/// Column sums per income category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub tithes: Decimal,
    pub offerings: Decimal,
    pub special_offerings: Decimal,
    pub etf: Decimal,
    pub pastors_warfare: Decimal,
    pub vigil: Decimal,
    pub thanksgiving: Decimal,
    pub retirees: Decimal,
    pub missionaries: Decimal,
    pub youth: Decimal,
    pub district_support: Decimal,
}

impl CategoryTotals {
    pub fn add(&mut self, r: &ServiceRecord) {
        self.tithes += r.tithes;
        self.offerings += r.offerings;
        self.special_offerings += r.special_offerings;
        self.etf += r.etf;
        self.pastors_warfare += r.pastors_warfare;
        self.vigil += r.vigil;
        self.thanksgiving += r.thanksgiving;
        self.retirees += r.retirees;
        self.missionaries += r.missionaries;
        self.youth += r.youth;
        self.district_support += r.district_support;
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ServiceRecord>) -> Self {
        let mut totals = Self::default();
        for r in records {
            totals.add(r);
        }
        totals
    }

    /// Labelled categories, tithes first.
    pub fn labelled(&self) -> Vec<(&'static str, Decimal)> {
        vec![
            ("Tithes", self.tithes),
            ("Offerings", self.offerings),
            ("Special offerings", self.special_offerings),
            ("ETF", self.etf),
            ("Pastors' warfare", self.pastors_warfare),
            ("Vigil", self.vigil),
            ("Thanksgiving", self.thanksgiving),
            ("Retirees", self.retirees),
            ("Missionaries", self.missionaries),
            ("Youth", self.youth),
            ("District support", self.district_support),
        ]
    }

    pub fn grand_total(&self) -> Decimal {
        self.labelled().iter().map(|(_, v)| *v).sum()
    }

    /// Number of categories that received anything.
    pub fn active_categories(&self) -> usize {
        self.labelled().iter().filter(|(_, v)| *v > Decimal::ZERO).count()
    }
}

/// Largest amount a `NUMERIC(14,2)` column holds: 999,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Decimal places allowed on money.
const MONEY_SCALE: u32 = 2;

/// Reject amounts that are negative, finer than a cent, or beyond [`MAX_AMOUNT`].
pub fn validate_amount(value: Decimal, what: &str) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::Validation(format!("{what} cannot be negative")));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(AppError::Validation(format!(
            "{what} has more than {MONEY_SCALE} decimal places"
        )));
    }
    if value > MAX_AMOUNT {
        return Err(AppError::Validation(format!("{what} exceeds {MAX_AMOUNT}")));
    }
    Ok(())
}

/// Sum that fails instead of overflowing and stays within [`MAX_AMOUNT`].
pub fn checked_sum(
    values: impl IntoIterator<Item = Decimal>,
    what: &str,
) -> Result<Decimal, AppError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .filter(|sum| *sum <= MAX_AMOUNT)
        .ok_or_else(|| AppError::Validation(format!("{what} exceeds {MAX_AMOUNT}")))
}

pub fn record_total(record: &ServiceRecord) -> Result<Decimal, AppError> {
    let categories = record.offering_categories().map(|(_, v)| v);
    checked_sum(
        std::iter::once(record.tithes).chain(categories),
        &format!("Total for week {}", record.week),
    )
}

/// Replace the client-side total with the server-computed one.
pub fn normalize_record(mut record: ServiceRecord) -> Result<ServiceRecord, AppError> {
    let computed = record_total(&record)?;
    if !record.total.is_zero() && record.total != computed {
        tracing::warn!(
            week = record.week,
            submitted = %record.total,
            computed = %computed,
            "Client record total disagrees with category sum, using computed total"
        );
    }
    record.total = computed;
    Ok(record)
}

/// Reject bad amounts, out-of-range weeks, and sub-counts above the head count.
pub fn validate_record(record: &ServiceRecord) -> Result<(), AppError> {
    if !WEEK_RANGE.contains(&record.week) {
        return Err(AppError::Validation(format!(
            "Week {} is out of range (1-5)",
            record.week
        )));
    }

    let week = record.week;
    let amounts = std::iter::once(("Tithes", record.tithes)).chain(record.offering_categories());
    for (label, value) in amounts {
        validate_amount(value, &format!("{label} for week {week}"))?;
    }

    let head_count = record.attendance.total();
    if u64::from(record.attendance.sbs) > head_count {
        return Err(AppError::Validation(format!(
            "SBS attendance for week {week} exceeds total attendance"
        )));
    }
    if u64::from(record.attendance.visitors) > head_count {
        return Err(AppError::Validation(format!(
            "Visitors for week {week} exceed total attendance"
        )));
    }
    Ok(())
}

pub fn report_totals(records: &[ServiceRecord]) -> Result<ReportTotals, AppError> {
    let mut totals = ReportTotals {
        total_tithes: checked_sum(records.iter().map(|r| r.tithes), "Total tithes")?,
        total_income: checked_sum(
            records.iter().map(record_total).collect::<Result<Vec<_>, _>>()?,
            "Total income",
        )?,
        ..Default::default()
    };
    totals.total_offerings = totals.total_income - totals.total_tithes;
    totals.total_attendance = records.iter().map(|r| r.attendance.total()).sum();
    Ok(totals)
}

/// `part / whole * 100` rounded to one decimal place, kept within `[0, 100]`.
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO || part <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let pct = (part / whole * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    pct.min(Decimal::ONE_HUNDRED)
}

/// Division that yields zero for an empty denominator, rounded to cents.
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    (numerator / denominator).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
