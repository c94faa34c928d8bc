//! Conversation context: the transcript and token estimation.
//!
//! - [`transcript`]: [`Transcript`] holds the ordered history, enforces the
//!   tool-call pairing contract, and bounds growth with a windowed
//!   truncation that never separates a tool result from its call.
//! - [`estimate`]: [`TokenEstimator`] gives a best-effort token count per
//!   model: tiktoken where available, otherwise 4 characters per token.

pub mod estimate;
pub mod transcript;

// Re-export commonly used items at the module level.
pub use estimate::{
    DEFAULT_CHARS_PER_TOKEN, HeuristicTokenCounter, TiktokenCounter, TokenCounter, TokenEstimator,
};
pub use transcript::Transcript;
