//! Typed error taxonomy for the orchestration core.
//!
//! Failures fall into four families, each handled by a different policy:
//!
//! - [`ApiError`]: transport failures at the model boundary. `Transient`
//!   failures are retried by the [`RequestExecutor`](crate::api::executor::RequestExecutor);
//!   `Terminal` failures propagate immediately.
//! - [`ToolError`]: registry and capability failures. Turned into text for
//!   the model by the orchestrator, never a failed turn.
//! - [`TranscriptError`]: pairing / ordering contract violations. These
//!   indicate a bug in the caller, not a runtime condition.
//! - [`LedgerError`] / [`SessionError`]: on-disk persistence.
//!
//! [`TurnError`] is what a failed user turn surfaces to the interactive loop.

use thiserror::Error;

/// A failure talking to the model endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Rate limit, timeout, connection failure or 5xx. Worth retrying.
    #[error("transient API failure: {0}")]
    Transient(String),
    /// Authentication, validation or malformed request. Retrying won't help.
    #[error("API request rejected: {0}")]
    Terminal(String),
}

impl ApiError {
    /// Classify a non-success HTTP status into a transient or terminal failure.
    pub fn from_status(status: u16, body: &str) -> Self {
        let msg = format!("HTTP {status}: {body}");
        if crate::api::retry::is_transient_status(status) {
            ApiError::Transient(msg)
        } else {
            ApiError::Terminal(msg)
        }
    }

    /// Classify a reqwest failure. Timeouts and connection errors are
    /// transient; everything else (builder, redirect, decode) is terminal.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ApiError::Transient(format!("request failed: {err}"))
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), &err.to_string())
        } else {
            ApiError::Terminal(format!("request failed: {err}"))
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// A tool registry or capability failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown tool '{0}'")]
    Unknown(String),
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    /// The capability itself reported a domain error.
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Shorthand for a capability's own domain failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        ToolError::Failed(reason.into())
    }

    /// Render as the text payload handed back to the model in a `tool` message.
    pub fn to_tool_content(&self) -> String {
        format!("Error: {self}")
    }
}

/// A violation of the transcript's structural invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("tool message references unknown tool_call_id '{0}'")]
    UnknownToolCallId(String),
    #[error("tool call '{0}' already has a result")]
    DuplicateToolResult(String),
    #[error("{count} tool call(s) still awaiting results: {ids:?}")]
    UnansweredToolCalls { count: usize, ids: Vec<String> },
}

/// Cost-log persistence failure.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("cost log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cost log is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// An exact tokenizer could not be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("tokenizer unavailable for '{model}': {reason}")]
pub struct TokenizerError {
    pub model: String,
    pub reason: String,
}

/// Conversation snapshot persistence failure.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Why a user turn failed. The transcript has already been rolled back
/// when the orchestrator returns one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The endpoint answered, but its tool calls cannot be recorded
    /// (missing or repeated ids).
    #[error("malformed model reply: {0}")]
    MalformedReply(String),
    #[error("transcript invariant violated: {0}")]
    Invariant(#[from] TranscriptError),
}

impl TurnError {
    /// Whether the interactive loop may simply prompt again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TurnError::Api(_) | TurnError::MalformedReply(_))
    }
}
