//! Convenience re-exports for common `toolchat` types.
//!
//! Meant to be glob-imported:
//!
//! ```ignore
//! use toolchat::prelude::*;
//! ```
//!
//! Pulls in the client, message types, the orchestrator with its config and
//! ledger, and the tool registry. Backoff internals and the token counter
//! trait are left out; import those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatClient, Message, MessageRole, ToolCallRequest, ToolDef, json_schema_for};

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::error::{ApiError, ToolError, TranscriptError, TurnError};

// ── Session runtime ─────────────────────────────────────────────────
pub use crate::agent::{
    ChatConfig, Command, CostLedger, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    Orchestrator, Session, TurnEvent, TurnOutcome, format_cost,
};

// ── API ─────────────────────────────────────────────────────────────
pub use crate::api::{ChatBackend, RetryConfig};

// ── Context ─────────────────────────────────────────────────────────
pub use crate::context::Transcript;

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{FnTool, Tool, ToolFuture, ToolRegistry, ToolSpec};
