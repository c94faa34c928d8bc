//! Turn events and observers.
//!
//! The [`Orchestrator`](super::orchestrator::Orchestrator) emits a
//! [`TurnEvent`] at each state transition of a user turn. Observers are
//! read-only: they cannot alter the turn.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |

use crate::error::TurnError;
use tracing::{debug, info, warn};

/// Which of the (at most two) model calls of a turn is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The first call, advertising tools.
    Initial,
    /// The follow-up call after tool results, with no tools advertised.
    FollowUp,
}

/// Events emitted by the orchestrator during a turn.
#[derive(Debug)]
pub enum TurnEvent<'a> {
    /// Old messages were dropped before the turn began.
    Truncated { removed: usize, remaining: usize },
    /// A model call is about to be issued.
    Dispatching { phase: CallPhase, messages: usize },
    /// The model asked for tools.
    ToolCallsReceived { count: usize },
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished; `is_error` marks dispatch failures turned into text.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
        is_error: bool,
    },
    /// A model call completed with this usage.
    TokenUsage {
        phase: CallPhase,
        input_tokens: u64,
        output_tokens: u64,
        estimated: bool,
    },
    /// The turn produced its final answer.
    Completed { text: &'a str, cost: f64 },
    /// The turn failed and `removed` messages were rolled back.
    Failed { error: &'a TurnError, removed: usize },
}

/// Observer for [`TurnEvent`]s.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &TurnEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// # Example
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let TurnEvent::ToolExecuting { name, .. } = event {
///         eprintln!("running {name}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&TurnEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &TurnEvent<'_>) {
        (self.0)(event)
    }
}

/// Logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &TurnEvent<'_>) {
        match event {
            TurnEvent::Truncated { removed, remaining } => {
                info!("Transcript truncated: dropped {removed} message(s), {remaining} remain");
            }
            TurnEvent::Dispatching { phase, messages } => {
                debug!("{phase:?} model call with {messages} message(s)");
            }
            TurnEvent::ToolCallsReceived { count } => {
                debug!("{count} tool call(s) requested");
            }
            TurnEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            TurnEvent::ToolResult {
                name,
                result,
                is_error,
                ..
            } => {
                if *is_error {
                    warn!("Tool {name} failed: {result}");
                } else {
                    debug!("Tool {name} result: {} bytes", result.len());
                }
            }
            TurnEvent::TokenUsage {
                phase,
                input_tokens,
                output_tokens,
                estimated,
            } => {
                debug!(
                    "{phase:?} tokens: input={input_tokens}, output={output_tokens}{}",
                    if *estimated { " (estimated)" } else { "" }
                );
            }
            TurnEvent::Completed { text, cost } => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "Turn completed (${cost:.6}): {preview}{}",
                    if text.len() > 200 { "..." } else { "" }
                );
            }
            TurnEvent::Failed { error, removed } => {
                warn!("Turn failed, rolled back {removed} message(s): {error}");
            }
        }
    }
}
