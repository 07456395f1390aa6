//! Gateway response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Payload;

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Result of one successful gateway invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Matches the `request_id` of the invocation's usage record.
    pub request_id: Uuid,
    pub payload: Payload,
    /// Quality score in `[0, 100]`; 100 for cache hits and unvalidated calls.
    pub quality: u8,
    pub cache_hit: bool,
    pub model: String,
    /// Zero on cache hits.
    pub usage: TokenUsage,
    /// USD; zero on cache hits.
    pub cost: f64,
}
