use std::time::Duration;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{ApiErrorEnvelope, MessagesRequest, MessagesResponse};
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// The one model call the tool loop needs.
#[async_trait]
pub trait MessagesApi: Send + Sync {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse>;
}

/// HTTP client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build from `ANTHROPIC_API_KEY` and optional `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::MissingApiKey)?;
        let mut client = Self::new(key);
        if let Ok(base) = std::env::var("ANTHROPIC_BASE_URL") {
            if !base.trim().is_empty() {
                client = client.with_base_url(base);
            }
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay before the first retry; doubles on each further retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * 2u32.saturating_pow(attempt)
    }
}

#[async_trait]
impl MessagesApi for AnthropicClient {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut attempt = 0;

        loop {
            let sent = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(request)
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status().as_u16();
            let body = response.text().await?;

            if (200..300).contains(&status) {
                return serde_json::from_str(&body)
                    .map_err(|source| AgentError::Parse { body, source });
            }

            if is_retryable(status) && attempt < self.max_retries {
                tracing::warn!(status, attempt, "retryable API status, backing off");
                tokio::time::sleep(self.backoff(attempt)).await;
                attempt += 1;
                continue;
            }

            return Err(api_error(status, &body));
        }
    }
}

fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

fn api_error(status: u16, body: &str) -> AgentError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => AgentError::Api {
            status,
            kind: env.error.kind,
            message: env.error.message,
        },
        Err(_) => AgentError::Api {
            status,
            kind: "unknown".into(),
            message: body.to_string(),
        },
    }
}
