//! Database models and DTOs for all domain entities.

pub mod assembly;
pub mod pagination;
pub mod report;
pub mod tithe;
pub mod user;
