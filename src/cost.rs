//! Token → money conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Price of a model in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCostRate {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelCostRate {
    /// Negative or non-finite rates are stored as zero.
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k: sanitize(input_per_1k),
            output_per_1k: sanitize(output_per_1k),
        }
    }

    /// Copy with both rates passed through the same clamp as [`new`](Self::new).
    pub fn sanitized(self) -> Self {
        Self::new(self.input_per_1k, self.output_per_1k)
    }
}

fn sanitize(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 { rate } else { 0.0 }
}

/// Built-in rate table (USD per 1K tokens).
const DEFAULT_RATES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.000_15, 0.000_6),
    ("gpt-4o", 0.002_5, 0.01),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4", 0.03, 0.06),
    ("gpt-3.5-turbo", 0.000_5, 0.001_5),
    ("claude-3-5-sonnet", 0.003, 0.015),
    ("claude-3-5-haiku", 0.000_8, 0.004),
    ("claude-3-haiku", 0.000_25, 0.001_25),
    ("claude-3-opus", 0.015, 0.075),
];

/// Model identifier → [`ModelCostRate`] table.
///
/// Lookup tries an exact match first, then the longest registered prefix,
/// so dated variants (`gpt-4o-mini-2024-07-18`) resolve to their family.
#[derive(Debug, Clone)]
pub struct CostModel {
    rates: HashMap<String, ModelCostRate>,
}

impl CostModel {
    /// Table with no rates; every model costs zero.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Add or replace a model's rate. Invalid rates are stored as zero.
    pub fn set_rate(&mut self, model: impl Into<String>, rate: ModelCostRate) {
        self.rates.insert(model.into(), rate.sanitized());
    }

    /// Builder-style [`set_rate`](Self::set_rate).
    pub fn with_rate(mut self, model: impl Into<String>, rate: ModelCostRate) -> Self {
        self.set_rate(model, rate);
        self
    }

    /// Rate for `model`, if known.
    pub fn rate(&self, model: &str) -> Option<ModelCostRate> {
        if let Some(rate) = self.rates.get(model) {
            return Some(*rate);
        }
        self.rates
            .iter()
            .filter(|(name, _)| model.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, rate)| *rate)
    }

    /// Cost in USD of a call. Unknown models cost zero.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32, model: &str) -> f64 {
        match self.rate(model) {
            Some(rate) => {
                (f64::from(input_tokens) * rate.input_per_1k
                    + f64::from(output_tokens) * rate.output_per_1k)
                    / 1000.0
            }
            None => {
                warn!(model, "no cost rate for model, recording zero cost");
                0.0
            }
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        let mut model = Self::empty();
        for (name, input, output) in DEFAULT_RATES {
            model.set_rate(*name, ModelCostRate::new(*input, *output));
        }
        model
    }
}
