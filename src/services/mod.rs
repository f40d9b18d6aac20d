//! Business logic services.

pub mod ai_report;
pub mod analysis;
pub mod assembly;
pub mod auth;
pub mod dashboard;
pub mod llm;
pub mod period;
pub mod report;
pub mod report_cache;
pub mod tithe;
pub mod totals;
