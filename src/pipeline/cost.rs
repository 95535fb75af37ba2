use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// USD per million tokens for each billable token category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

impl ModelRates {
    pub const SONNET_4: ModelRates = ModelRates {
        input: 3.0,
        output: 15.0,
        cache_write: 3.75,
        cache_read: 0.3,
    };
}

/// Token counts reported by the provider for one call. Absent or null
/// fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "count_or_zero")]
    pub input_tokens: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub output_tokens: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub cache_creation_input_tokens: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub cache_read_input_tokens: i64,
}

fn count_or_zero<'de, D: serde::Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(d)?.unwrap_or(0))
}

/// Model id -> rates, with a fallback row for unrecognized models.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelRates>,
    fallback: ModelRates,
}

impl PricingTable {
    pub fn new(fallback: ModelRates) -> Self {
        Self {
            models: HashMap::new(),
            fallback,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, rates: ModelRates) -> Self {
        self.models.insert(model.into(), rates);
        self
    }

    /// Exact match on the model id; anything else gets the fallback row.
    pub fn rates_for(&self, model: &str) -> ModelRates {
        self.models.get(model).copied().unwrap_or(self.fallback)
    }

    /// Estimated USD cost of one call. No rounding happens here.
    pub fn cost(&self, usage: &TokenUsage, model: &str) -> f64 {
        let rates = self.rates_for(model);
        per_million(usage.input_tokens, rates.input)
            + per_million(usage.output_tokens, rates.output)
            + per_million(usage.cache_creation_input_tokens, rates.cache_write)
            + per_million(usage.cache_read_input_tokens, rates.cache_read)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        PricingTable::new(ModelRates::SONNET_4).with_model(DEFAULT_MODEL, ModelRates::SONNET_4)
    }
}

fn per_million(tokens: i64, rate: f64) -> f64 {
    // Negative counts never come from the provider; clamp so cost stays >= 0.
    tokens.max(0) as f64 * rate / 1_000_000.0
}
