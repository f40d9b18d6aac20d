//! Service report model: one submission per assembly, month and service type.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "service_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Sunday,
    Midweek,
    Special,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Midweek => "midweek",
            Self::Special => "special",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sunday => write!(f, "Sunday service"),
            Self::Midweek => write!(f, "Midweek service"),
            Self::Special => write!(f, "Special service"),
        }
    }
}

/// Head counts for one service. `sbs` and `visitors` are subsets of the total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Attendance {
    pub men: u32,
    pub women: u32,
    pub children: u32,
    /// Sunday Bible School attendees, counted inside the total.
    pub sbs: u32,
    pub visitors: u32,
}

impl Attendance {
    pub fn total(&self) -> u64 {
        u64::from(self.men) + u64::from(self.women) + u64::from(self.children)
    }
}

/// One weekly line item inside a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceRecord {
    pub week: u8,
    pub date: Option<NaiveDate>,
    pub attendance: Attendance,
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
    /// Derived on the server; any client-supplied value is replaced.
    pub total: Decimal,
}

impl ServiceRecord {
    /// Every non-tithe category paired with its display label.
    pub fn offering_categories(&self) -> [(&'static str, Decimal); 10] {
        [
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

    /// Sum of every category except tithes.
    pub fn offering_total(&self) -> Decimal {
        self.offering_categories().iter().map(|(_, v)| *v).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub assembly: String,
    pub month: String,
    pub service_type: ServiceType,
    pub submitted_by: String,
    pub records: Json<Vec<ServiceRecord>>,
    pub total_income: Decimal,
    pub total_tithes: Decimal,
    pub total_attendance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report list row without the embedded records.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportSummary {
    pub id: Uuid,
    pub assembly: String,
    pub month: String,
    pub service_type: ServiceType,
    pub submitted_by: String,
    pub total_income: Decimal,
    pub total_tithes: Decimal,
    pub total_attendance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Spreadsheet snapshot posted by the entry forms.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitReport {
    #[validate(length(min = 1, max = 120))]
    pub assembly: String,
    #[validate(length(equal = 7))]
    pub month: String,
    #[serde(alias = "serviceType")]
    pub service_type: ServiceType,
    #[validate(length(min = 1, max = 6))]
    pub records: Vec<ServiceRecord>,
}

/// Query filters shared by report listing, dashboards and AI reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilters {
    pub assembly: Option<String>,
    pub month: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "serviceType", alias = "service_type")]
    pub service_type: Option<ServiceType>,
}
