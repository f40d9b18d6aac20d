//! Per-member weekly tithe sheet.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Maximum number of Sundays a month can contain.
pub const MAX_WEEKS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TitheRecord {
    pub id: Uuid,
    pub assembly: String,
    pub month: String,
    pub member_name: String,
    pub weekly_amounts: Json<Vec<Decimal>>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TitheEntry {
    #[validate(length(min = 1, max = 120))]
    pub member_name: String,
    #[validate(length(max = 5))]
    pub weekly_amounts: Vec<Decimal>,
}

impl TitheEntry {
    pub fn total(&self) -> Decimal {
        self.weekly_amounts.iter().copied().sum()
    }
}

/// Full sheet snapshot for one assembly and month.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveTitheSheet {
    #[validate(length(min = 1, max = 120))]
    pub assembly: String,
    #[validate(length(equal = 7))]
    pub month: String,
    #[validate(nested)]
    pub entries: Vec<TitheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitheSheetSummary {
    pub assembly: Option<String>,
    pub month: Option<String>,
    pub member_count: usize,
    pub total: Decimal,
    /// Column sums, one per week.
    pub weekly_totals: Vec<Decimal>,
}
