//! Per-model pricing for cost estimation.
//!
//! Rates are USD per 1K tokens. Lookups for models missing from the table
//! fall back to the default model's rates and log a warning rather than
//! failing: cost tracking is for spotting runaway spend, not billing.

use std::collections::HashMap;
use tracing::warn;

/// Model whose rates are used for unknown models.
pub const DEFAULT_PRICING_MODEL: &str = "gpt-3.5-turbo";

/// Per-model pricing (USD per 1K tokens).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Price per 1K input tokens.
    pub input_per_1k: f64,
    /// Price per 1K output tokens.
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Pricing table keyed by exact model identifier.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelPricing>,
    default_model: String,
}

impl Default for PricingTable {
    /// Approximate list prices as of late 2025.
    fn default() -> Self {
        Self {
            rates: [
                ("gpt-4", ModelPricing::new(0.03, 0.06)),
                ("gpt-4-turbo", ModelPricing::new(0.01, 0.03)),
                ("gpt-3.5-turbo", ModelPricing::new(0.0005, 0.0015)),
                ("claude-3-opus", ModelPricing::new(0.015, 0.075)),
                ("claude-3-sonnet", ModelPricing::new(0.003, 0.015)),
                ("claude-3-haiku", ModelPricing::new(0.00025, 0.00125)),
                ("gemini-pro", ModelPricing::new(0.00025, 0.0005)),
            ]
            .into_iter()
            .map(|(model, pricing)| (model.to_string(), pricing))
            .collect(),
            default_model: DEFAULT_PRICING_MODEL.to_string(),
        }
    }
}

impl PricingTable {
    /// Add or replace a model's rates (builder pattern).
    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.rates.insert(model.into(), pricing);
        self
    }

    /// Change which model's rates are used for unknown models.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Rates for a model, if the table knows it.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.rates.get(model).copied()
    }

    /// Rates for a model, falling back to the default model's rates.
    ///
    /// Returns the pricing together with the model whose rates were applied.
    pub fn resolve<'a>(&'a self, model: &'a str) -> (ModelPricing, &'a str) {
        if let Some(pricing) = self.rates.get(model) {
            return (*pricing, model);
        }
        warn!(
            "Pricing not found for {model}, using {} rates",
            self.default_model
        );
        let fallback = self
            .rates
            .get(&self.default_model)
            .copied()
            .unwrap_or(ModelPricing::new(0.0005, 0.0015));
        (fallback, self.default_model.as_str())
    }

    /// Cost of a single call.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.resolve(model).0.estimate_cost(input_tokens, output_tokens)
    }
}
