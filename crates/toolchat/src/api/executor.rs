//! Single model call with retry: the boundary between the turn loop and the
//! model endpoint.
//!
//! [`RequestExecutor::send`] builds one [`ChatRequest`] from a transcript view
//! and optional tool schemas, issues it through a [`ChatBackend`], and
//! retries transient failures with exponential backoff. It never touches the
//! transcript or the cost ledger.

use crate::api::retry::RetryConfig;
use crate::error::ApiError;
use crate::{ChatCompletion, ChatRequest, Message, ToolCallRequest, ToolChoice, ToolDef, UsageInfo};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

/// The model endpoint as seen by the executor.
///
/// Implemented by [`ChatClient`](crate::ChatClient) for the HTTP API; tests
/// substitute scripted backends.
pub trait ChatBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatCompletion, ApiError>>;
}

impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatCompletion, ApiError>> {
        (**self).complete(request)
    }
}

impl<T: ChatBackend + ?Sized> ChatBackend for Box<T> {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatCompletion, ApiError>> {
        (**self).complete(request)
    }
}

/// Per-call request options.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Only sent when tool schemas are advertised.
    pub tool_choice: Option<ToolChoice>,
}

impl SendOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 0,
            temperature: None,
            tool_choice: None,
        }
    }
}

/// Normalized model reply: either a final answer or tool-call requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Usage as reported by the endpoint, if any.
    pub usage: Option<UsageInfo>,
}

impl ModelReply {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

impl From<ChatCompletion> for ModelReply {
    fn from(completion: ChatCompletion) -> Self {
        Self {
            content: completion.content,
            tool_calls: completion.tool_calls,
            usage: completion.usage,
        }
    }
}

/// Wraps a [`ChatBackend`] with the retry policy.
pub struct RequestExecutor<B> {
    backend: B,
    retry: RetryConfig,
}

impl<B: ChatBackend> RequestExecutor<B> {
    pub fn new(backend: B, retry: RetryConfig) -> Self {
        Self { backend, retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Issue one request for the given messages, retrying transient failures.
    ///
    /// `tools` of `None` (or an empty slice) sends no tool schemas and no
    /// tool-choice policy. On the final failed attempt the underlying error
    /// is returned unchanged.
    pub async fn send(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDef]>,
        options: &SendOptions,
    ) -> Result<ModelReply, ApiError> {
        let tools = tools.filter(|t| !t.is_empty()).map(<[ToolDef]>::to_vec);
        let tool_choice = tools.as_ref().and(options.tool_choice);
        let body = ChatRequest {
            model: options.model.clone(),
            messages: messages.to_vec(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools,
            tool_choice,
        };

        let completion = retry_api_call(&self.retry, || self.backend.complete(&body)).await?;
        debug!(
            "Model reply: {} chars text, {} tool call(s)",
            completion.content.as_ref().map_or(0, |c| c.len()),
            completion.tool_calls.len()
        );
        Ok(completion.into())
    }
}

/// Retry an async API call with exponential backoff for transient errors.
///
/// Makes at most `config.max_attempts` attempts. Terminal errors return
/// immediately.
pub async fn retry_api_call<T, F, Fut>(config: &RetryConfig, mut call: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = config.delay_after_attempt(attempt);
                warn!("Transient API error (attempt {attempt}/{max_attempts}): {e}. Retrying in {delay:?}...");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
