//! Options for raw-prompt gateway calls

use std::time::Duration;

/// Settings for [`Gateway::structured_response`](crate::Gateway::structured_response).
///
/// Unset values fall back to the `[operations.<operation>]` override and
/// then to the gateway defaults.
///
/// ```rust
/// # use sluice::types::StructuredRequest;
/// let request = StructuredRequest::new("triage")
///     .expect(&["category", "confidence"])
///     .max_tokens(200)
///     .temperature(0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    /// Label recorded on the usage record and used for override lookup.
    pub operation: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
    /// When non-empty, the reply is parsed as JSON and quality-scored.
    pub expected_fields: Vec<String>,
    pub cache_ttl: Option<Duration>,
}

impl Default for StructuredRequest {
    fn default() -> Self {
        Self::new("structured")
    }
}

impl StructuredRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            system: None,
            expected_fields: Vec::new(),
            cache_ttl: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn expect(mut self, fields: &[&str]) -> Self {
        self.expected_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}
