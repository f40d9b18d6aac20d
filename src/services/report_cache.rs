//! Redis cache for generated AI report text.
//!
//! Every failure here is logged and treated as a miss; report generation never
//! depends on the cache being reachable.

use redis::AsyncCommands;
use sha2::{Digest, Sha256};

/// Cache handle; cloning is cheap.
#[derive(Debug, Clone)]
pub struct ReportCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl ReportCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Report cache unavailable");
                return None;
            }
        };
        let result: redis::RedisResult<Option<String>> = conn.get(key).await;
        match result {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key, "Report cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, value: &str) {
        if self.ttl_secs == 0 {
            return;
        }
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Report cache unavailable");
                return;
            }
        };
        let result: redis::RedisResult<()> = conn.set_ex(key, value, self.ttl_secs).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, key, "Report cache write failed");
        }
    }
}

/// `ai-report:{kind}:{sha256(prompt)}`.
pub fn cache_key(kind: &str, system: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update([0u8]);
    hasher.update(user.as_bytes());
    format!("ai-report:{kind}:{}", hex::encode(hasher.finalize()))
}
