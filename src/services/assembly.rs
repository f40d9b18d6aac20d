//! Assembly registry: create, list, lookup and update.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::assembly::{Assembly, AssemblyStatus, CreateAssembly, UpdateAssembly};
use crate::models::pagination::{PagedResult, Pagination};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssemblyFilters {
    pub status: Option<AssemblyStatus>,
    /// Case-insensitive match on name, pastor or location.
    pub search: Option<String>,
}

fn map_unique_violation(e: sqlx::Error, name: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("Assembly '{name}' already exists"))
        }
        _ => AppError::Database(e),
    }
}

pub async fn create(pool: &PgPool, input: &CreateAssembly) -> Result<Assembly, AppError> {
    input.validate()?;
    let name = input.name.trim();

    sqlx::query_as::<_, Assembly>(
        r#"
        INSERT INTO assemblies (name, pastor, location, member_count)
        VALUES ($1, $2, $3, COALESCE($4, 0))
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&input.pastor)
    .bind(&input.location)
    .bind(input.member_count)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, name))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Assembly, AppError> {
    sqlx::query_as::<_, Assembly>("SELECT * FROM assemblies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Assembly not found".to_string()))
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Assembly>, AppError> {
    let assembly = sqlx::query_as::<_, Assembly>("SELECT * FROM assemblies WHERE name = $1")
        .bind(name.trim())
        .fetch_optional(pool)
        .await?;
    Ok(assembly)
}

/// Resolve a name to an assembly that may still receive reports.
pub async fn require_active(pool: &PgPool, name: &str) -> Result<Assembly, AppError> {
    let assembly = find_by_name(pool, name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Assembly '{name}' not found")))?;
    if assembly.status != AssemblyStatus::Active {
        return Err(AppError::Validation(format!(
            "Assembly '{}' is inactive",
            assembly.name
        )));
    }
    Ok(assembly)
}

pub async fn list(
    pool: &PgPool,
    filters: &AssemblyFilters,
    pagination: &Pagination,
) -> Result<PagedResult<Assembly>, AppError> {
    let search = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let where_clause = r#"
        WHERE ($1::assembly_status IS NULL OR status = $1)
          AND ($2::text IS NULL OR name ILIKE $2 OR pastor ILIKE $2 OR location ILIKE $2)
    "#;

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM assemblies {where_clause}"
    ))
    .bind(filters.status)
    .bind(&search)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, Assembly>(&format!(
        "SELECT * FROM assemblies {where_clause} ORDER BY name ASC LIMIT $3 OFFSET $4"
    ))
    .bind(filters.status)
    .bind(&search)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Update an assembly. A rename is carried over to reports, tithe sheets and
/// users, which reference assemblies by name.
pub async fn update(pool: &PgPool, id: Uuid, input: &UpdateAssembly) -> Result<Assembly, AppError> {
    input.validate()?;
    let existing = find_by_id(pool, id).await?;
    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.name)
        .to_string();

    let mut tx = pool.begin().await?;

    let updated = sqlx::query_as::<_, Assembly>(
        r#"
        UPDATE assemblies SET
            name = $2,
            pastor = COALESCE($3, pastor),
            location = COALESCE($4, location),
            member_count = COALESCE($5, member_count),
            status = COALESCE($6, status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&name)
    .bind(&input.pastor)
    .bind(&input.location)
    .bind(input.member_count)
    .bind(input.status)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, &name))?;

    if name != existing.name {
        for table in ["reports", "tithe_records", "users"] {
            sqlx::query(&format!("UPDATE {table} SET assembly = $1 WHERE assembly = $2"))
                .bind(&name)
                .bind(&existing.name)
                .execute(&mut *tx)
                .await?;
        }
        tracing::info!(from = %existing.name, to = %name, "Assembly renamed");
    }

    tx.commit().await?;
    Ok(updated)
}
