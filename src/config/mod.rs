use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_access_token_expiry_secs: i64,
    pub jwt_refresh_token_expiry_secs: i64,
    pub frontend_url: String,
    pub llm: LlmConfig,
    pub ai_report_cache_ttl_secs: u64,
}

/// Settings for the external completions API used by AI reports.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `None` disables the integration; every AI report then uses the fallback template.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("BACKEND_PORT", 3000),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_access_token_expiry_secs: parse_or("JWT_ACCESS_TOKEN_EXPIRY_SECS", 900),
            jwt_refresh_token_expiry_secs: parse_or("JWT_REFRESH_TOKEN_EXPIRY_SECS", 604800),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            llm: LlmConfig::from_env(),
            ai_report_cache_ttl_secs: parse_or("AI_REPORT_CACHE_TTL_SECS", 3600),
        })
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("LLM_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_secs: parse_or("LLM_TIMEOUT_SECS", 60),
            max_tokens: parse_or("LLM_MAX_TOKENS", 1500),
        }
    }
}

/// Read and parse an optional variable, falling back on absence or parse failure.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
