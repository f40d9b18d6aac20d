//! Assembly (local congregation) reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "assembly_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssemblyStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assembly {
    pub id: Uuid,
    pub name: String,
    pub pastor: Option<String>,
    pub location: Option<String>,
    pub member_count: i32,
    pub status: AssemblyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAssembly {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub pastor: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(range(min = 0, max = 100000))]
    pub member_count: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateAssembly {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 120))]
    pub pastor: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(range(min = 0, max = 100000))]
    pub member_count: Option<i32>,
    pub status: Option<AssemblyStatus>,
}
