//! The turn loop.
//!
//! One [`Orchestrator::run_turn`] call takes a user input through to a final
//! assistant answer:
//!
//! ```text
//! AwaitingUserInput
//!   -> Dispatching (first call, tools advertised)
//!   -> [ToolHandling -> Dispatching (follow-up call, no tools)]
//!   -> Responding
//!   -> AwaitingUserInput
//! ```
//!
//! At most one round of tool dispatch happens per turn. Tool calls run one
//! at a time in the order the model emitted them. If any model call fails,
//! the transcript is rolled back to exactly its pre-turn state and no cost
//! is recorded; the caller can simply prompt again.

use crate::agent::config::ChatConfig;
use crate::agent::events::{CallPhase, EventHandler, LoggingHandler, TurnEvent};
use crate::agent::ledger::{CostLedger, CostRecord};
use crate::api::executor::{ChatBackend, ModelReply, RequestExecutor};
use crate::context::estimate::TokenEstimator;
use crate::context::transcript::{Transcript, check_call_ids};
use crate::error::TurnError;
use crate::tools::core::ToolRegistry;
use crate::{Message, ToolCallRequest};
use tracing::{debug, warn};

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// What a successful turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    /// Final assistant text (empty if the model returned none).
    pub text: String,
    /// Number of tool calls dispatched this turn.
    pub tool_calls: usize,
    /// Model calls made (1 or 2).
    pub model_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Cost of this turn in USD.
    pub cost: f64,
}

impl TurnSummary {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Result of [`Orchestrator::run_turn`].
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Empty or whitespace-only input: nothing was sent or recorded.
    Skipped,
    Answered(TurnSummary),
}

impl TurnOutcome {
    /// The final answer, or `""` for a skipped turn.
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Skipped => "",
            TurnOutcome::Answered(summary) => &summary.text,
        }
    }

    pub fn summary(&self) -> Option<&TurnSummary> {
        match self {
            TurnOutcome::Skipped => None,
            TurnOutcome::Answered(summary) => Some(summary),
        }
    }
}

/// Owns one session's transcript, tools and cost ledger, and runs turns
/// against a [`ChatBackend`].
pub struct Orchestrator<B> {
    executor: RequestExecutor<B>,
    tools: ToolRegistry,
    ledger: CostLedger,
    transcript: Transcript,
    estimator: TokenEstimator,
    config: ChatConfig,
    events: Box<dyn EventHandler>,
    session_cost: f64,
    turns: u32,
}

impl<B: ChatBackend> Orchestrator<B> {
    /// Argument validation and the tool timeout on `tools` are overridden
    /// by `config`.
    pub fn new(backend: B, tools: ToolRegistry, ledger: CostLedger, config: ChatConfig) -> Self {
        Self {
            executor: RequestExecutor::new(backend, config.retry.clone()),
            tools: tools
                .with_arg_validation(config.validate_tool_args)
                .with_timeout(config.tool_timeout),
            ledger,
            transcript: Transcript::new(DEFAULT_SYSTEM_PROMPT),
            estimator: TokenEstimator::for_model(&config.model),
            config,
            events: Box::new(LoggingHandler),
            session_cost: 0.0,
            turns: 0,
        }
    }

    /// Replace the system prompt, starting a fresh transcript.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.transcript = Transcript::new(prompt);
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.events = Box::new(handler);
        self
    }

    pub fn with_estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut CostLedger {
        &mut self.ledger
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        self.executor.backend()
    }

    /// Cost of the turns completed by this orchestrator.
    pub fn session_cost(&self) -> f64 {
        self.session_cost
    }

    /// Completed turns.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Estimated token size of the whole transcript.
    pub fn estimated_transcript_tokens(&self) -> u64 {
        self.estimator
            .estimate_messages(self.transcript.messages(), &self.config.model)
    }

    /// Run one user turn.
    ///
    /// On `Err`, the transcript is byte-for-byte what it was before the
    /// call and nothing was added to the ledger.
    pub async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, TurnError> {
        if input.trim().is_empty() {
            return Ok(TurnOutcome::Skipped);
        }

        if self.transcript.len() >= self.config.max_messages {
            let target = self.config.truncate_to.saturating_sub(1).max(1);
            let removed = self.transcript.truncate(target);
            if removed > 0 {
                self.events.on_event(&TurnEvent::Truncated {
                    removed,
                    remaining: self.transcript.len(),
                });
            }
        }

        let checkpoint = self.transcript.len();
        self.transcript.append(Message::user(input))?;

        match self.dispatch_turn().await {
            Ok((summary, records)) => {
                if let Err(e) = self.ledger.commit(records) {
                    warn!("Failed to persist cost log: {e}");
                }
                self.session_cost += summary.cost;
                self.turns += 1;
                debug_assert!(self.transcript.validate().is_ok());
                self.events.on_event(&TurnEvent::Completed {
                    text: &summary.text,
                    cost: summary.cost,
                });
                Ok(TurnOutcome::Answered(summary))
            }
            Err(error) => {
                let removed = self.transcript.rollback_last_user_turn();
                debug_assert_eq!(self.transcript.len(), checkpoint);
                self.events.on_event(&TurnEvent::Failed {
                    error: &error,
                    removed,
                });
                Err(error)
            }
        }
    }

    /// Steps between appending the user message and committing cost.
    async fn dispatch_turn(&mut self) -> Result<(TurnSummary, Vec<CostRecord>), TurnError> {
        let definitions = self.tools.definitions();
        let mut records = Vec::with_capacity(2);

        self.events.on_event(&TurnEvent::Dispatching {
            phase: CallPhase::Initial,
            messages: self.transcript.len(),
        });
        let first = self
            .executor
            .send(
                self.transcript.messages(),
                Some(&definitions),
                &self.config.tool_call_options(),
            )
            .await?;
        records.push(self.price_call(CallPhase::Initial, &first));

        let tool_calls = first.tool_calls.len();
        let text = if first.wants_tools() {
            check_call_ids(&first.tool_calls)
                .map_err(|e| TurnError::MalformedReply(e.to_string()))?;
            self.handle_tool_calls(first.content, first.tool_calls).await?;

            self.events.on_event(&TurnEvent::Dispatching {
                phase: CallPhase::FollowUp,
                messages: self.transcript.len(),
            });
            let follow_up = self
                .executor
                .send(self.transcript.messages(), None, &self.config.answer_options())
                .await?;
            records.push(self.price_call(CallPhase::FollowUp, &follow_up));
            if follow_up.wants_tools() {
                warn!(
                    "Ignoring {} tool call(s) requested by the follow-up call",
                    follow_up.tool_calls.len()
                );
            }
            follow_up.content.unwrap_or_else(|| {
                warn!("Model returned no text after tool results");
                String::new()
            })
        } else {
            first.content.unwrap_or_default()
        };

        self.transcript.append(Message::assistant_text(text.clone()))?;

        let summary = TurnSummary {
            text,
            tool_calls,
            model_calls: records.len(),
            input_tokens: records.iter().map(|r| r.input_tokens).sum(),
            output_tokens: records.iter().map(|r| r.output_tokens).sum(),
            cost: records.iter().map(|r| r.cost).sum(),
        };
        Ok((summary, records))
    }

    /// Append the assistant's tool-call message, then one `tool` message per
    /// call in emission order. Dispatch failures become error text.
    async fn handle_tool_calls(
        &mut self,
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    ) -> Result<(), TurnError> {
        self.events
            .on_event(&TurnEvent::ToolCallsReceived { count: calls.len() });
        self.transcript
            .append(Message::assistant_tool_calls(content, calls.clone()))?;

        for call in &calls {
            self.events.on_event(&TurnEvent::ToolExecuting {
                name: call.tool_name(),
                arguments: &call.function.arguments,
            });
            let (result, is_error) = match self.tools.dispatch_call(call).await {
                Ok(output) => (output, false),
                Err(e) => (e.to_tool_content(), true),
            };
            self.events.on_event(&TurnEvent::ToolResult {
                name: call.tool_name(),
                call_id: &call.id,
                result: &result,
                is_error,
            });
            self.transcript
                .append(Message::tool_result(&call.id, call.tool_name(), result))?;
        }
        Ok(())
    }

    /// Build the cost record for a model call just made against the current
    /// transcript. Reported usage wins; otherwise tokens are estimated.
    fn price_call(&self, phase: CallPhase, reply: &ModelReply) -> CostRecord {
        let model = self.config.model.as_str();
        let reported = reply
            .usage
            .and_then(|u| Some((u.prompt_tokens?, u.completion_tokens?)));
        let (input_tokens, output_tokens, estimated) = match reported {
            Some((input, output)) => (u64::from(input), u64::from(output), false),
            None => {
                let input = self
                    .estimator
                    .estimate_messages(self.transcript.messages(), model);
                let mut output_text = reply.content.clone().unwrap_or_default();
                for call in &reply.tool_calls {
                    output_text.push_str(&call.function.name);
                    output_text.push_str(&call.function.arguments);
                }
                let output = self.estimator.estimate_tokens(&output_text, model);
                (input, output, true)
            }
        };
        debug!("{phase:?} call usage: input={input_tokens}, output={output_tokens}");
        self.events.on_event(&TurnEvent::TokenUsage {
            phase,
            input_tokens,
            output_tokens,
            estimated,
        });
        let note = match phase {
            CallPhase::Initial => "initial",
            CallPhase::FollowUp => "follow-up",
        };
        self.ledger.quote(
            model,
            input_tokens,
            output_tokens,
            self.config.project.as_deref(),
            Some(note),
        )
    }
}
