//! Tithe sheets: save, list, summarise and spreadsheet import.

use std::collections::HashMap;
use std::io::Cursor;
use std::str::FromStr;

use calamine::{open_workbook_from_rs, Reader, Xlsx};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use validator::Validate;

use crate::errors::AppError;
use crate::models::tithe::{
    SaveTitheSheet, TitheEntry, TitheRecord, TitheSheetSummary, MAX_WEEKS,
};
use crate::services::{assembly, period, totals};

/// Header of the member-name column in imported sheets.
const MEMBER_COLUMN: &str = "member";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(Self::Xlsx)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub member_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TitheImportResult {
    pub total_rows: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportRowError>,
    pub summary: TitheSheetSummary,
}

fn validate_entry(entry: &TitheEntry) -> Result<(), AppError> {
    let member = entry.member_name.trim();
    if member.is_empty() {
        return Err(AppError::Validation("Member name cannot be blank".to_string()));
    }
    for (i, amount) in entry.weekly_amounts.iter().enumerate() {
        totals::validate_amount(*amount, &format!("Week {} tithe for '{member}'", i + 1))?;
    }
    totals::checked_sum(
        entry.weekly_amounts.iter().copied(),
        &format!("Tithe total for '{member}'"),
    )?;
    Ok(())
}

/// Replace every row of the sheet for `(assembly, month)` in one transaction.
pub async fn save_sheet(
    pool: &PgPool,
    input: &SaveTitheSheet,
) -> Result<Vec<TitheRecord>, AppError> {
    input.validate()?;
    period::parse_month(&input.month)?;
    let assembly = assembly::require_active(pool, &input.assembly).await?;

    let mut seen = std::collections::HashSet::new();
    for entry in &input.entries {
        validate_entry(entry)?;
        if !seen.insert(entry.member_name.trim().to_lowercase()) {
            return Err(AppError::Validation(format!(
                "Member '{}' appears more than once",
                entry.member_name.trim()
            )));
        }
    }

    let month = input.month.trim();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM tithe_records WHERE assembly = $1 AND month = $2")
        .bind(&assembly.name)
        .bind(month)
        .execute(&mut *tx)
        .await?;

    let mut saved = Vec::with_capacity(input.entries.len());
    for entry in &input.entries {
        let row = sqlx::query_as::<_, TitheRecord>(
            r#"
            INSERT INTO tithe_records (assembly, month, member_name, weekly_amounts, total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&assembly.name)
        .bind(month)
        .bind(entry.member_name.trim())
        .bind(Json(&entry.weekly_amounts))
        .bind(entry.total())
        .fetch_one(&mut *tx)
        .await?;
        saved.push(row);
    }

    tx.commit().await?;

    tracing::info!(
        assembly = %assembly.name,
        month,
        members = saved.len(),
        "Tithe sheet saved"
    );
    Ok(saved)
}

pub async fn list(
    pool: &PgPool,
    assembly: Option<&str>,
    month: Option<&str>,
) -> Result<Vec<TitheRecord>, AppError> {
    if let Some(m) = month {
        period::parse_month(m)?;
    }
    let rows = sqlx::query_as::<_, TitheRecord>(
        r#"
        SELECT * FROM tithe_records
        WHERE ($1::text IS NULL OR assembly = $1)
          AND ($2::text IS NULL OR month = $2)
        ORDER BY month DESC, assembly ASC, member_name ASC
        "#,
    )
    .bind(assembly)
    .bind(month)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Row and column sums over tithe records.
pub fn summarize_sheet(
    assembly: Option<&str>,
    month: Option<&str>,
    records: &[TitheRecord],
) -> TitheSheetSummary {
    let mut weekly_totals = vec![Decimal::ZERO; MAX_WEEKS];
    let mut total = Decimal::ZERO;
    for record in records {
        for (slot, amount) in weekly_totals.iter_mut().zip(record.weekly_amounts.0.iter()) {
            *slot += *amount;
        }
        total += record.total;
    }
    let used_weeks = records
        .iter()
        .map(|r| r.weekly_amounts.0.len())
        .max()
        .unwrap_or(0);
    weekly_totals.truncate(used_weeks);

    TitheSheetSummary {
        assembly: assembly.map(String::from),
        month: month.map(String::from),
        member_count: records.len(),
        total,
        weekly_totals,
    }
}

/// Parse an uploaded sheet and save it as the tithe sheet for `(assembly, month)`.
pub async fn import_sheet(
    pool: &PgPool,
    assembly_name: &str,
    month: &str,
    data: &[u8],
    format: &SheetFormat,
) -> Result<TitheImportResult, AppError> {
    let parsed = parse_sheet(data, format)?;

    let sheet = SaveTitheSheet {
        assembly: assembly_name.to_string(),
        month: month.to_string(),
        entries: parsed.entries,
    };
    let saved = save_sheet(pool, &sheet).await?;
    let summary = summarize_sheet(
        Some(sheet.assembly.as_str()),
        Some(sheet.month.as_str()),
        &saved,
    );

    Ok(TitheImportResult {
        total_rows: parsed.total_rows,
        imported: saved.len(),
        skipped: parsed.skipped,
        errors: parsed.errors,
        summary,
    })
}

#[derive(Debug)]
struct ParsedSheet {
    total_rows: usize,
    entries: Vec<TitheEntry>,
    skipped: usize,
    errors: Vec<ImportRowError>,
}

/// Header row plus one map per data row, keyed by header.
type SheetRows = (Vec<String>, Vec<HashMap<String, String>>);

/// Parse an upload into entries. A sheet with no member column, or with no
/// usable member rows, is rejected so it never replaces a saved sheet.
fn parse_sheet(data: &[u8], format: &SheetFormat) -> Result<ParsedSheet, AppError> {
    let (headers, rows) = match format {
        SheetFormat::Csv => parse_csv_rows(data)?,
        SheetFormat::Xlsx => parse_xlsx_rows(data)?,
    };
    if !headers.iter().any(|h| h.trim().eq_ignore_ascii_case(MEMBER_COLUMN)) {
        return Err(AppError::Validation("Sheet has no 'Member' column".to_string()));
    }

    let parsed = rows_to_entries(&rows);
    if parsed.entries.is_empty() {
        return Err(AppError::Validation(format!(
            "Sheet has no valid member rows ({} skipped, {} with errors)",
            parsed.skipped,
            parsed.errors.len()
        )));
    }
    Ok(parsed)
}

/// Week columns are matched by header ("Week 1", "week1", "W1", ...).
fn week_index(header: &str) -> Option<usize> {
    let h = header.trim().to_lowercase().replace(' ', "");
    let digits = h.strip_prefix("week").or_else(|| h.strip_prefix('w'))?;
    let n: usize = digits.parse().ok()?;
    (1..=MAX_WEEKS).contains(&n).then(|| n - 1)
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let amount =
        Decimal::from_str(&cleaned).map_err(|_| format!("'{raw}' is not an amount"))?;
    totals::validate_amount(amount, &format!("'{raw}'")).map_err(|e| match e {
        AppError::Validation(message) => message,
        other => other.to_string(),
    })?;
    Ok(amount)
}

fn rows_to_entries(rows: &[HashMap<String, String>]) -> ParsedSheet {
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    let mut errors = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let member = row
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(MEMBER_COLUMN))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty());
        let Some(member) = member else {
            skipped += 1;
            continue;
        };

        let mut weeks: Vec<(usize, &String)> = row
            .iter()
            .filter_map(|(k, v)| week_index(k).map(|idx| (idx, v)))
            .collect();
        weeks.sort_by_key(|(idx, _)| *idx);

        let width = weeks.last().map(|(idx, _)| idx + 1).unwrap_or(0);
        let mut weekly_amounts = vec![Decimal::ZERO; width];
        let mut row_error = None;
        for (idx, raw) in weeks {
            match parse_amount(raw) {
                Ok(amount) => weekly_amounts[idx] = amount,
                Err(message) => {
                    row_error = Some(message);
                    break;
                }
            }
        }

        match row_error {
            // Header is row 1.
            Some(message) => errors.push(ImportRowError {
                row: i + 2,
                member_name: Some(member.to_string()),
                message,
            }),
            None => entries.push(TitheEntry {
                member_name: member.to_string(),
                weekly_amounts,
            }),
        }
    }

    ParsedSheet {
        total_rows: rows.len(),
        entries,
        skipped,
        errors,
    }
}

fn parse_csv_rows(data: &[u8]) -> Result<SheetRows, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Invalid CSV headers: {e}")))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AppError::Validation(format!("CSV parse error: {e}")))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

fn parse_xlsx_rows(data: &[u8]) -> Result<SheetRows, AppError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e| AppError::Validation(format!("Invalid XLSX file: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Validation("XLSX file has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Validation(format!("Failed to read sheet '{sheet_name}': {e}")))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = row_iter
        .next()
        .ok_or_else(|| AppError::Validation("XLSX sheet is empty".to_string()))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let rows = row_iter
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let value = row.get(i).map(|c| c.to_string()).unwrap_or_default();
                    (h.clone(), value)
                })
                .collect()
        })
        .collect();
    Ok((headers, rows))
}
