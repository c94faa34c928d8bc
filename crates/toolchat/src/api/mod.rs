//! API interaction layer: request execution, retry, and pricing.
//!
//! These modules handle everything between the
//! [`Orchestrator`](crate::agent::orchestrator::Orchestrator) turn loop and the
//! chat-completions endpoint:
//!
//! - [`executor`]: [`ChatBackend`] seam and the [`RequestExecutor`] that builds
//!   one request, issues it, and normalizes the reply into a [`ModelReply`].
//! - [`retry`]: transient error detection (429, 5xx, network timeouts) with
//!   exponential backoff. Never retries 400/401 errors.
//! - [`pricing`]: per-model rates used by the cost ledger.

pub mod executor;
pub mod pricing;
pub mod retry;

// Re-export commonly used items at the module level.
pub use executor::{ChatBackend, ModelReply, RequestExecutor, SendOptions};
pub use pricing::{ModelPricing, PricingTable};
pub use retry::RetryConfig;
