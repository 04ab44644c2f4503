use std::{sync::Arc, time::Duration};

use anyhow::Context;
use futures::future::BoxFuture;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{HttpClientConfig, SummarizerConfig};

const SYSTEM_PROMPT: &str = "You are an assistant that summarizes news clearly and concisely.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotConfigured,
    EmptyInput,
    QuotaExceeded,
    RateLimited,
    OtherError,
    TimedOut,
}

impl UnavailableReason {
    /// Whether the dashboard should tell the user that summaries degraded.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            UnavailableReason::NotConfigured | UnavailableReason::EmptyInput
        )
    }

    pub fn notice(&self) -> &'static str {
        match self {
            UnavailableReason::NotConfigured => "Summaries are disabled: no API key was provided.",
            UnavailableReason::EmptyInput => "Nothing to summarize.",
            UnavailableReason::QuotaExceeded => {
                "Summarization quota exceeded. Showing original summaries instead."
            }
            UnavailableReason::RateLimited => {
                "Summarization is rate limited. Showing original summaries instead."
            }
            UnavailableReason::OtherError => {
                "Summarization failed. Showing original summaries instead."
            }
            UnavailableReason::TimedOut => {
                "Summarization timed out. Showing original summaries instead."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryResult {
    Summary(String),
    Unavailable(UnavailableReason),
}

/// How one attempt against the endpoint went.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptError {
    QuotaExceeded,
    RateLimited,
    Other(String),
}

/// Waits between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

pub struct SummaryClient {
    http: Client,
    config: SummarizerConfig,
    api_key: Option<String>,
    sleeper: Arc<dyn Sleeper>,
}

impl SummaryClient {
    pub fn new(config: SummarizerConfig, http_client: &HttpClientConfig) -> anyhow::Result<Self> {
        let http = http_client
            .apply(Client::builder())
            .context("failed to apply http settings for summary client")?
            .build()
            .context("failed to build summary http client")?;

        Ok(Self::with_http(http, config))
    }

    pub fn with_http(http: Client, config: SummarizerConfig) -> Self {
        Self {
            http,
            config,
            api_key: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// A copy of this client bound to the caller's bearer credential.
    pub fn with_api_key(&self, api_key: Option<&str>) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            sleeper: Arc::clone(&self.sleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize with the configured retry budget.
    pub async fn summarize(&self, text: &str) -> SummaryResult {
        self.summarize_with_retries(text, self.config.max_retries)
            .await
    }

    pub async fn summarize_with_retries(&self, text: &str, max_retries: u32) -> SummaryResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return SummaryResult::Unavailable(UnavailableReason::NotConfigured);
        };
        if text.trim().is_empty() {
            return SummaryResult::Unavailable(UnavailableReason::EmptyInput);
        }

        let cap = self.config.total_timeout();
        match tokio::time::timeout(cap, self.attempt_loop(api_key, text, max_retries.max(1))).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = cap.as_secs(), "summarization exceeded wall-clock cap");
                SummaryResult::Unavailable(UnavailableReason::TimedOut)
            }
        }
    }

    async fn attempt_loop(&self, api_key: &str, text: &str, max_retries: u32) -> SummaryResult {
        let base = self.config.backoff_base();
        for attempt in 1..=max_retries {
            match self.request_summary(api_key, text).await {
                Ok(summary) => {
                    debug!(attempt, "summary received");
                    return SummaryResult::Summary(summary);
                }
                Err(AttemptError::QuotaExceeded) => {
                    warn!(attempt, "summarization quota exceeded");
                    return SummaryResult::Unavailable(UnavailableReason::QuotaExceeded);
                }
                Err(AttemptError::RateLimited) if attempt < max_retries => {
                    let delay = backoff_delay(base, attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                    self.sleeper.sleep(delay).await;
                }
                Err(AttemptError::RateLimited) => {
                    warn!(attempts = attempt, "summarization still rate limited, giving up");
                    return SummaryResult::Unavailable(UnavailableReason::RateLimited);
                }
                Err(AttemptError::Other(message)) => {
                    warn!(attempt, error = %message, "summarization failed");
                    return SummaryResult::Unavailable(UnavailableReason::OtherError);
                }
            }
        }
        SummaryResult::Unavailable(UnavailableReason::RateLimited)
    }

    async fn request_summary(&self, api_key: &str, text: &str) -> Result<String, AttemptError> {
        let base = self.config.base_url.trim_end_matches('/');
        let url = format!("{base}/v1/chat/completions");

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(text),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| AttemptError::Other(format!("summary request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| AttemptError::Other(format!("failed to parse summary response: {err}")))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AttemptError::Other("summary response missing message content".into()))
    }
}

fn build_prompt(text: &str) -> String {
    format!("Summarize this news article in 2 sentences:\n{text}")
}

fn classify_failure(status: StatusCode, body: &str) -> AttemptError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_default();
    let code = detail.code.unwrap_or_default().to_ascii_lowercase();
    let kind = detail.kind.unwrap_or_default().to_ascii_lowercase();
    let message = detail.message.unwrap_or_default();
    let lowered = message.to_ascii_lowercase();

    let quota = status == StatusCode::PAYMENT_REQUIRED
        || [code.as_str(), kind.as_str()]
            .iter()
            .any(|value| value.contains("insufficient_quota") || value.starts_with("billing"))
        || lowered.contains("quota")
        || lowered.contains("billing");
    if quota {
        return AttemptError::QuotaExceeded;
    }

    if status == StatusCode::TOO_MANY_REQUESTS || code == "rate_limit_exceeded" {
        return AttemptError::RateLimited;
    }

    let message = if message.is_empty() {
        body.chars().take(200).collect()
    } else {
        message
    };
    AttemptError::Other(format!("summary endpoint returned {status}: {message}"))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}
