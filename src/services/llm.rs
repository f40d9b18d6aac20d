//! Client for an OpenAI-compatible chat completions API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("missing api key: LLM_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("completion contained no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pewledger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        Self::new(
            api_key,
            &config.base_url,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_tokens,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system/user prompt pair and return the trimmed reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: TEMPERATURE,
            max_tokens: self.max_tokens,
        };

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(http_error(status, body));
        }

        let body: CompletionResponse = res
            .json()
            .await
            .map_err(|e| LlmError::Serde(e.to_string()))?;

        extract_text(body)
    }
}

fn extract_text(body: CompletionResponse) -> Result<String, LlmError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyResponse)
}

fn http_error(status: StatusCode, body: String) -> LlmError {
    const MAX_BODY: usize = 500;
    let mut body = body.trim().to_string();
    if body.len() > MAX_BODY {
        let cut = (0..=MAX_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        body.truncate(cut);
    }
    LlmError::Http {
        status: status.as_u16(),
        body,
    }
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}
