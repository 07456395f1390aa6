//! Provider trait for LLM completions.
//!
//! The gateway depends only on [`CompletionProvider`], so tests and
//! embedders can substitute their own implementation for the HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::TokenUsage;

/// One completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// Optional system instruction sent ahead of the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Provider reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model the provider reports having used.
    pub model: String,
}

/// An LLM backend.
///
/// Implementations report failures as [`SluiceError`](crate::SluiceError)
/// provider variants (`Http`, `Api`, `Timeout`, `EmptyResponse`). They must
/// not retry; the gateway calls each provider at most once per invocation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}
