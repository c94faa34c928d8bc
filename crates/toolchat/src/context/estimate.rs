//! Best-effort token estimation.
//!
//! Exact tokenizers can be registered per model; [`TiktokenCounter`] covers
//! the OpenAI encodings. Any model without one falls back to a
//! characters-per-token heuristic, so estimation never fails.

use crate::Message;
use crate::error::TokenizerError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Characters per token used when no exact tokenizer is registered.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// A tokenizer for one model family.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u64;
}

/// Character-ratio token counter: `tokens = chars / chars_per_token`,
/// rounded down.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenCounter {
    chars_per_token: f64,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() as f64 / self.chars_per_token) as u64
    }
}

/// BPE tokenizer from `tiktoken-rs`.
///
/// Uses the model's own encoding when tiktoken knows the model, and
/// `cl100k_base` otherwise.
pub struct TiktokenCounter {
    bpe: CoreBPE,
    model: String,
    fallback_encoding: bool,
}

impl TiktokenCounter {
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let (bpe, fallback_encoding) = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => (bpe, false),
            Err(e) => {
                debug!("No tiktoken encoding for {model} ({e}), using cl100k_base");
                let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError {
                    model: model.to_string(),
                    reason: e.to_string(),
                })?;
                (bpe, true)
            }
        };
        Ok(Self {
            bpe,
            model: model.to_string(),
            fallback_encoding,
        })
    }

    /// Whether the model was unknown to tiktoken and `cl100k_base` is used.
    pub fn uses_fallback_encoding(&self) -> bool {
        self.fallback_encoding
    }
}

impl fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("model", &self.model)
            .field("fallback_encoding", &self.fallback_encoding)
            .finish_non_exhaustive()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_text(&self, text: &str) -> u64 {
        self.bpe.encode_with_special_tokens(text).len() as u64
    }
}

/// Routes token estimation to an exact counter when one is registered for
/// the model, and to the heuristic otherwise.
#[derive(Clone, Default)]
pub struct TokenEstimator {
    exact: HashMap<String, Arc<dyn TokenCounter>>,
    fallback: HeuristicTokenCounter,
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<&String> = self.exact.keys().collect();
        models.sort();
        f.debug_struct("TokenEstimator")
            .field("exact", &models)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl TokenEstimator {
    /// Heuristic-only estimator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimator with a tiktoken counter registered for `model`. If the
    /// tokenizer cannot be loaded, the heuristic is used for everything.
    pub fn for_model(model: &str) -> Self {
        match TiktokenCounter::for_model(model) {
            Ok(counter) => Self::new().with_counter(model, Arc::new(counter)),
            Err(e) => {
                warn!("{e}; estimating {DEFAULT_CHARS_PER_TOKEN} chars per token");
                Self::new()
            }
        }
    }

    /// Register an exact tokenizer for a model (builder pattern).
    pub fn with_counter(mut self, model: impl Into<String>, counter: Arc<dyn TokenCounter>) -> Self {
        self.exact.insert(model.into(), counter);
        self
    }

    /// Replace the heuristic used for models without an exact tokenizer.
    pub fn with_fallback(mut self, fallback: HeuristicTokenCounter) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn has_exact(&self, model: &str) -> bool {
        self.exact.contains_key(model)
    }

    /// Approximate token count for `text` under `model`.
    pub fn estimate_tokens(&self, text: &str, model: &str) -> u64 {
        match self.exact.get(model) {
            Some(counter) => counter.count_text(text),
            None => self.fallback.count_text(text),
        }
    }

    /// Approximate token count for a message list: content plus any
    /// serialized tool calls.
    pub fn estimate_messages(&self, messages: &[Message], model: &str) -> u64 {
        messages
            .iter()
            .map(|m| self.estimate_tokens(&m.estimation_text(), model))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count_text(&self, text: &str) -> u64 {
            text.split_whitespace().count() as u64
        }
    }

    #[test]
    fn heuristic_is_four_chars_per_token() {
        let counter = HeuristicTokenCounter::default();
        assert_eq!(counter.count_text(""), 0);
        assert_eq!(counter.count_text("abc"), 0);
        assert_eq!(counter.count_text("abcd"), 1);
        assert_eq!(counter.count_text(&"x".repeat(400)), 100);
    }

    #[test]
    fn heuristic_counts_chars_not_bytes() {
        let counter = HeuristicTokenCounter::default();
        assert_eq!(counter.count_text("28°C"), 1);
    }

    #[test]
    fn non_positive_ratio_uses_default() {
        assert_eq!(
            HeuristicTokenCounter::new(0.0).chars_per_token(),
            DEFAULT_CHARS_PER_TOKEN
        );
    }

    #[test]
    fn exact_counter_wins_for_its_model() {
        let estimator = TokenEstimator::new().with_counter("gpt-4", Arc::new(WordCounter));
        let text = "the quick brown fox jumps";
        assert_eq!(estimator.estimate_tokens(text, "gpt-4"), 5);
        // 25 chars / 4
        assert_eq!(estimator.estimate_tokens(text, "gpt-3.5-turbo"), 6);
        assert!(estimator.has_exact("gpt-4"));
        assert!(!estimator.has_exact("claude-3-haiku"));
    }

    #[test]
    fn tiktoken_counts_known_models_exactly() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert!(!counter.uses_fallback_encoding());
        assert_eq!(counter.count_text("hello world"), 2);
        assert_eq!(counter.count_text(""), 0);
    }

    #[test]
    fn tiktoken_unknown_model_uses_cl100k() {
        let counter = TiktokenCounter::for_model("claude-3-haiku").unwrap();
        assert!(counter.uses_fallback_encoding());
        assert_eq!(counter.count_text("hello world"), 2);
    }

    #[test]
    fn for_model_registers_exact_counter() {
        let estimator = TokenEstimator::for_model("gpt-4");
        assert!(estimator.has_exact("gpt-4"));
        assert_eq!(estimator.estimate_tokens("hello world", "gpt-4"), 2);
        // Other models still go through the heuristic: 11 chars / 4.
        assert_eq!(estimator.estimate_tokens("hello world", "gemini-pro"), 2);
        assert_eq!(estimator.estimate_tokens(&"x".repeat(40), "gemini-pro"), 10);
    }

    #[test]
    fn messages_include_tool_calls() {
        let estimator = TokenEstimator::new();
        let call = crate::ToolCallRequest::new("c1", "get_weather", &serde_json::json!({"location": "Delhi"}));
        let with_call = Message::assistant_tool_calls(None, vec![call]);
        assert!(estimator.estimate_messages(&[with_call], "gpt-4") > 0);
        assert_eq!(
            estimator.estimate_messages(&[Message::user("abcdefgh")], "gpt-4"),
            2
        );
    }
}
