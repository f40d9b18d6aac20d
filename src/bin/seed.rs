//! Seed script for development: populates a fresh database with sample data.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` (reads .env).

use anyhow::Context;
use chrono::{Datelike, Utc};
use pewledger::models::assembly::CreateAssembly;
use pewledger::models::report::{Attendance, ServiceRecord, ServiceType, SubmitReport};
use pewledger::models::tithe::{SaveTitheSheet, TitheEntry};
use pewledger::services::{assembly, auth, period, report, tithe};
use rust_decimal::Decimal;
use sqlx::PgPool;

const ADMIN_PASSWORD: &str = "Admin123!";
const SECRETARY_PASSWORD: &str = "Secretary123!";

/// (name, pastor, location, members, size factor)
const ASSEMBLIES: &[(&str, &str, &str, i32, i64)] = &[
    ("Bethel Assembly", "Rev. Kwame Mensah", "Adenta", 320, 4),
    ("Zion Assembly", "Pastor Esi Appiah", "Madina", 210, 3),
    ("Calvary Assembly", "Pastor Yaw Darko", "Oyarifa", 140, 2),
    ("Grace Assembly", "Pastor Abena Ofori", "Ashaley Botwe", 90, 1),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = pewledger::db::create_pool(&db_url, 5).await?;
    pewledger::db::run_migrations(&pool).await?;

    println!("=== PewLedger Seed Script ===");

    seed_assemblies(&pool).await?;
    seed_users(&pool).await?;
    seed_reports(&pool).await?;
    seed_tithe_sheet(&pool).await?;

    println!("\n=== Seed complete! ===");
    println!("Admin login: admin / {ADMIN_PASSWORD}");
    println!("Secretary login: bethel_secretary / {SECRETARY_PASSWORD}");

    Ok(())
}

async fn seed_assemblies(pool: &PgPool) -> anyhow::Result<()> {
    let mut created = 0;
    for (name, pastor, location, members, _) in ASSEMBLIES {
        if assembly::find_by_name(pool, name).await?.is_some() {
            continue;
        }
        assembly::create(
            pool,
            &CreateAssembly {
                name: name.to_string(),
                pastor: Some(pastor.to_string()),
                location: Some(location.to_string()),
                member_count: Some(*members),
            },
        )
        .await?;
        created += 1;
    }
    println!("[done] Created {created} assemblies");
    Ok(())
}

async fn seed_users(pool: &PgPool) -> anyhow::Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = 'admin')")
            .fetch_one(pool)
            .await?;

    if exists {
        let hash = auth::hash_password(ADMIN_PASSWORD)?;
        sqlx::query("UPDATE users SET password_hash = $1 WHERE username = 'admin'")
            .bind(&hash)
            .execute(pool)
            .await?;
        println!("[done] Updated admin password");
        return Ok(());
    }

    let admin_hash = auth::hash_password(ADMIN_PASSWORD)?;
    sqlx::query(
        "INSERT INTO users (username, email, password_hash, display_name, role)
         VALUES ('admin', 'admin@pewledger.local', $1, 'District Administrator', 'District_Admin')",
    )
    .bind(&admin_hash)
    .execute(pool)
    .await?;

    let secretary_hash = auth::hash_password(SECRETARY_PASSWORD)?;
    sqlx::query(
        "INSERT INTO users (username, email, password_hash, display_name, role, assembly)
         VALUES ('bethel_secretary', 'secretary@bethel.local', $1, 'Bethel Secretary',
                 'Assembly_Secretary', 'Bethel Assembly')",
    )
    .bind(&secretary_hash)
    .execute(pool)
    .await?;

    println!("[done] Created admin and secretary users");
    Ok(())
}

/// Deterministic sample week; `factor` scales the assembly and `shift` varies months.
fn sample_week(week: u8, factor: i64, shift: i64) -> ServiceRecord {
    let w = i64::from(week);
    let base = factor * 100 + shift * 7 + w * 3;
    ServiceRecord {
        week,
        attendance: Attendance {
            men: (factor * 18 + w) as u32,
            women: (factor * 26 + shift) as u32,
            children: (factor * 12) as u32,
            sbs: (factor * 15) as u32,
            visitors: (w + shift) as u32,
        },
        tithes: Decimal::new(base * 450, 2),
        offerings: Decimal::new(base * 180, 2),
        special_offerings: Decimal::new(if week == 1 { base * 60 } else { 0 }, 2),
        etf: Decimal::new(factor * 2500, 2),
        pastors_warfare: Decimal::new(factor * 1500, 2),
        thanksgiving: Decimal::new(if week == 2 { base * 90 } else { 0 }, 2),
        youth: Decimal::new(factor * 1000, 2),
        district_support: Decimal::new(factor * 2000, 2),
        ..Default::default()
    }
}

async fn seed_reports(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let current = period::month_label(now.year(), now.month());
    let previous = period::previous_month(&current)?;
    let older = period::previous_month(&previous)?;

    let mut count = 0;
    for (shift, month) in [(0, &older), (1, &previous), (2, &current)] {
        for (name, _, _, _, factor) in ASSEMBLIES {
            let records = (1..=4).map(|w| sample_week(w, *factor, shift)).collect();
            report::submit(
                pool,
                &SubmitReport {
                    assembly: name.to_string(),
                    month: month.clone(),
                    service_type: ServiceType::Sunday,
                    records,
                },
                "seed",
            )
            .await?;
            count += 1;
        }
    }
    println!("[done] Upserted {count} sample reports");
    Ok(())
}

async fn seed_tithe_sheet(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let month = period::month_label(now.year(), now.month());
    let members = [
        ("Ama Owusu", [50, 50, 60, 50]),
        ("Kofi Boateng", [120, 0, 120, 120]),
        ("Efua Asante", [30, 30, 30, 30]),
        ("Kwesi Addo", [200, 0, 0, 250]),
    ];
    let entries = members
        .iter()
        .map(|(name, weeks)| TitheEntry {
            member_name: name.to_string(),
            weekly_amounts: weeks.iter().map(|a| Decimal::from(*a)).collect(),
        })
        .collect();

    let saved = tithe::save_sheet(
        pool,
        &SaveTitheSheet {
            assembly: "Bethel Assembly".to_string(),
            month,
            entries,
        },
    )
    .await?;
    println!("[done] Saved tithe sheet with {} members", saved.len());
    Ok(())
}
