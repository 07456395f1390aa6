//! Client for OpenAI-compatible chat completion APIs.
//!
//! Speaks the `POST {base_url}/chat/completions` dialect shared by OpenAI,
//! OpenRouter, Azure-style proxies and most self-hosted servers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionProvider, CompletionRequest, CompletionResponse};
use crate::template::truncate_chars;
use crate::types::TokenUsage;
use crate::{Result, SluiceError};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Longest error body kept in an [`SluiceError::Api`] message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    api_key: String,
    http: Client,
    base_url: String,
    name: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Client for a custom endpoint (proxies, wiremock in tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, base_url, Duration::from_secs(60))
    }

    /// Client with an explicit HTTP-level timeout.
    ///
    /// The gateway applies its own per-request timeout on top of this.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(crate::version::user_agent())
            .build()
            .map_err(|e| SluiceError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: "openai".to_string(),
            timeout,
        })
    }

    /// Override the name used in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Map a non-success status to an error, consuming the body for context.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            truncate_chars(&body, MAX_ERROR_BODY_CHARS).to_string()
        };
        Err(SluiceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &request.model,
                messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SluiceError::Timeout(self.timeout)
                } else {
                    SluiceError::Http(e.to_string())
                }
            })?;

        let response = Self::check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| SluiceError::Http(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(SluiceError::EmptyResponse)?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: body.model.unwrap_or_else(|| request.model.clone()),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ApiUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
