//! Conversational tool-use orchestration core for chat-completion LLM APIs.
//!
//! `toolchat` maintains an append-only conversation transcript, decides when
//! the model asked for a tool versus produced a final answer, dispatches tool
//! calls through a registry of named capabilities, keeps the transcript under
//! a message budget, records per-call cost, and retries transient request
//! failures without ever leaving the transcript half-updated.
//!
//! # Getting started
//!
//! ```ignore
//! use toolchat::prelude::*;
//! use toolchat::tools::demo::register_demo_tools;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(std::env::var("OPENAI_API_KEY")?)?;
//!     let config = ChatConfig::default().with_model("gpt-3.5-turbo");
//!
//!     let mut tools = ToolRegistry::new();
//!     register_demo_tools(&mut tools)?;
//!
//!     let ledger = CostLedger::open(&config.ledger_path)?;
//!     let mut orchestrator = Orchestrator::new(client, tools, ledger, config)
//!         .with_system_prompt("You are a helpful assistant.");
//!
//!     let outcome = orchestrator.run_turn("What's the weather in Delhi?").await?;
//!     println!("{}", outcome.text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Orchestrator`](agent::orchestrator::Orchestrator) turn loop, config, events, cost ledger, session commands |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolRegistry`](tools::core::ToolRegistry), [`ToolSpec`](tools::spec::ToolSpec), demo tools |
//! | [`context`] | [`Transcript`](context::transcript::Transcript) and token estimation |
//! | [`api`] | Request executor, retry with backoff, pricing |
//! | [`error`] | Typed failures: transient vs terminal transport, tool, transcript |

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod prelude;
pub mod tools;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::{
    ApiError, LedgerError, SessionError, TokenizerError, ToolError, TranscriptError, TurnError,
};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the `serde_json::Value` that the function-calling API expects.
///
/// # Example
///
/// ```
/// use toolchat::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs {
///     location: String,
/// }
///
/// let schema = json_schema_for::<WeatherArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"location".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// Tool-choice policy sent alongside advertised tools.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must answer in text.
    None,
    /// The model must call at least one tool.
    Required,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
///
/// `tool_calls` only appears on assistant messages; `tool_call_id` and
/// `name` only on tool messages.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, Some(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, Some(content.into()))
    }

    /// Assistant message carrying tool-call requests (and any text the model
    /// produced alongside them).
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
            ..Self::plain(MessageRole::Tool, Some(content.into()))
        }
    }

    /// Tool calls carried by this message (empty unless an assistant message
    /// requested tools).
    pub fn requested_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Text used for token estimation: content plus serialized tool calls.
    pub fn estimation_text(&self) -> String {
        let mut text = self.content.clone().unwrap_or_default();
        for call in self.requested_calls() {
            text.push_str(&call.function.name);
            text.push_str(&call.function.arguments);
        }
        text
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition or call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolType {
    #[serde(rename = "function")]
    #[default]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
///
/// `arguments` keeps the serialized payload exactly as the model sent it so
/// the transcript replays byte-for-byte; use [`ToolCallRequest::parse_arguments`]
/// for the structured view.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default)]
    pub call_type: ToolType,
    pub function: FunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: &serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: ToolType::Function,
            function: FunctionCall {
                name: tool_name.into(),
                arguments: arguments.to_string(),
            },
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.function.name
    }

    /// Parse the serialized argument payload. An empty payload is treated as
    /// an empty object.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, ToolError> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
            tool: self.function.name.clone(),
            reason: format!("arguments are not valid JSON: {e}"),
        })
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from a [`ChatBackend`](api::executor::ChatBackend).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A plain text completion with no usage report.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A completion that requests the given tool calls.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) url: String,
}

impl ChatClient {
    /// Create a client for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_url(api_key, OPENAI_CHAT_URL)
    }

    /// Create a client for a custom OpenAI-compatible endpoint.
    pub fn with_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("toolchat/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ApiError::Terminal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, ApiError> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, |t| t.len()),
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ApiError::from_reqwest(&e))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        parse_chat_response(&text)
    }
}

impl api::executor::ChatBackend for ChatClient {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatCompletion, ApiError>> {
        Box::pin(self.chat(request))
    }
}

/// Decode a chat-completions response body.
pub(crate) fn parse_chat_response(text: &str) -> Result<ChatCompletion, ApiError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| ApiError::Terminal(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(ApiError::Terminal(format!("API error: {}", err.message)));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => Ok(ChatCompletion {
            content: c.message.content,
            tool_calls: c.message.tool_calls.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        }),
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let tool = Message::tool_result("call-1", "get_weather", "Sunny");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(tool.name.as_deref(), Some("get_weather"));
    }

    #[test]
    fn chat_request_skips_empty_fields() {
        let req = ChatRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn tool_choice_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), "auto");
    }

    #[test]
    fn assistant_tool_call_message_keeps_null_content() {
        let call = ToolCallRequest::new("c1", "get_weather", &serde_json::json!({"location": "Delhi"}));
        let msg = Message::assistant_tool_calls(None, vec![call]);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "get_weather");
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Delhi\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52}
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].tool_name(), "get_weather");
        let args = completion.tool_calls[0].parse_arguments().unwrap();
        assert_eq!(args["location"], "Delhi");
        assert_eq!(completion.usage.unwrap().prompt_tokens, Some(40));
    }

    #[test]
    fn in_body_error_is_terminal() {
        let err = parse_chat_response(r#"{"error": {"message": "invalid api key"}}"#).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn unparseable_arguments_are_a_tool_error() {
        let call = ToolCallRequest {
            id: "c1".into(),
            call_type: ToolType::Function,
            function: FunctionCall {
                name: "calculate".into(),
                arguments: "{not json".into(),
            },
        };
        assert!(matches!(
            call.parse_arguments(),
            Err(ToolError::InvalidArguments { .. })
        ));
    }
}
