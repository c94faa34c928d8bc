//! Configuration for the [`Orchestrator`](super::orchestrator::Orchestrator).
//!
//! `ChatConfig` is constructed once per process and handed to the
//! orchestrator; there is no ambient configuration.
//!
//! # Examples
//!
//! ```ignore
//! let config = ChatConfig::default()
//!     .with_model("gpt-4")
//!     .with_temperature(0.2)
//!     .with_context_window(40, 20)
//!     .with_project("support-bot");
//! ```

use crate::DEFAULT_MODEL;
use crate::api::executor::SendOptions;
use crate::api::retry::RetryConfig;
use crate::ToolChoice;
use std::path::PathBuf;
use std::time::Duration;

/// Default cost log location.
pub const DEFAULT_LEDGER_PATH: &str = "cost_log.json";

/// Per-session orchestration settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model identifier (e.g. `"gpt-3.5-turbo"`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Retry configuration for transient API failures.
    pub retry: RetryConfig,
    /// Once the transcript holds this many messages, it is truncated at the
    /// start of the next turn.
    pub max_messages: usize,
    /// Message count the transcript is cut back to, including the incoming
    /// user message.
    pub truncate_to: usize,
    /// Where the cost log is persisted.
    pub ledger_path: PathBuf,
    /// Project label attached to every cost record.
    pub project: Option<String>,
    /// Validate tool arguments against their JSON Schema before dispatch.
    pub validate_tool_args: bool,
    /// Per-call tool execution limit. `None` lets tools run to completion.
    pub tool_timeout: Option<Duration>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            retry: RetryConfig::default(),
            max_messages: 50,
            truncate_to: 30,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            project: None,
            validate_tool_args: true,
            tool_timeout: None,
        }
    }
}

impl ChatConfig {
    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum tokens per model response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the truncation trigger and target. `truncate_to` is clamped to
    /// `max_messages` and to at least 2 (system prompt plus the new message).
    pub fn with_context_window(mut self, max_messages: usize, truncate_to: usize) -> Self {
        self.max_messages = max_messages.max(2);
        self.truncate_to = truncate_to.clamp(2, self.max_messages);
        self
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_tool_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_tool_args = enabled;
        self
    }

    /// Fail tool calls that run longer than `timeout`. A timed-out call is
    /// reported to the model as error text.
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Options for the first call of a turn, which advertises tools.
    pub(crate) fn tool_call_options(&self) -> SendOptions {
        SendOptions {
            tool_choice: Some(ToolChoice::Auto),
            ..self.answer_options()
        }
    }

    /// Options for a call that must answer in text.
    pub(crate) fn answer_options(&self) -> SendOptions {
        SendOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            tool_choice: None,
        }
    }
}
