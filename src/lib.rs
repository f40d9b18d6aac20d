pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use sqlx::PgPool;

use services::llm::{LlmClient, LlmError};
use services::report_cache::ReportCache;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    /// `None` when no API key is configured; AI reports then use the fallback.
    pub llm: Option<LlmClient>,
    pub cache: Option<ReportCache>,
}

impl AppState {
    /// Build state from config, wiring the optional AI client and report cache.
    pub fn new(db: PgPool, config: config::AppConfig) -> Self {
        let llm = match LlmClient::from_config(&config.llm) {
            Ok(client) => {
                tracing::info!(model = client.model(), "AI report generation enabled");
                Some(client)
            }
            Err(LlmError::MissingApiKey) => {
                tracing::warn!("LLM_API_KEY not set, AI reports will use the fallback template");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI client could not be built, using fallback reports");
                None
            }
        };

        let cache = match redis::Client::open(config.redis_url.as_str()) {
            Ok(client) => Some(ReportCache::new(client, config.ai_report_cache_ttl_secs)),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid REDIS_URL, AI report cache disabled");
                None
            }
        };

        Self {
            db,
            config,
            llm,
            cache,
        }
    }
}
