//! Tool abstraction and the registry the orchestrator dispatches through.
//!
//! The [`Tool`] trait is the fixed capability signature: structured
//! arguments in, text out. Tools are registered into a [`ToolRegistry`]
//! together with the [`ToolSpec`] that advertises them, and are looked up by
//! name at dispatch time.

use crate::error::ToolError;
use crate::tools::spec::ToolSpec;
use crate::{ToolCallRequest, ToolDef};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A capability the model can invoke via function-calling.
///
/// Domain failures are returned as `Err(ToolError::Failed(..))`; the
/// orchestrator turns them into text for the model.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Tool for Echo {
///     fn execute(&self, arguments: Value) -> ToolFuture<'_> {
///         Box::pin(async move { Ok(arguments.to_string()) })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Run the tool with already-parsed arguments.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, arguments: Value) -> ToolFuture<'_>;
}

// ── FnTool ────────────────────────────────────────────────────────

type ErasedToolHandler = Box<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based tool that deserializes its arguments into `A` and
/// delegates to a handler.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs { query: String }
///
/// let tool = FnTool::new(|args: SearchArgs| async move {
///     Ok(format!("results for {}", args.query))
/// });
/// registry.register(
///     ToolSpec::builder("search").description("Search").parameters_for::<SearchArgs>().build(),
///     tool,
/// )?;
/// ```
pub struct FnTool {
    handler: ErasedToolHandler,
}

impl FnTool {
    /// Create a tool from an async handler.
    pub fn new<A, F, Fut>(handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let erased =
            move |raw: Value| -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>> {
                match serde_json::from_value::<A>(raw) {
                    Ok(args) => Box::pin(handler(args)),
                    Err(e) => {
                        let err = ToolError::failed(format!("invalid arguments: {e}"));
                        Box::pin(async move { Err(err) })
                    }
                }
            };
        Self {
            handler: Box::new(erased),
        }
    }

    /// Create a tool from a synchronous handler.
    pub fn from_sync<A, F>(handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        let handler = std::sync::Arc::new(handler);
        Self::new(move |args: A| {
            let handler = handler.clone();
            async move { handler(args) }
        })
    }
}

impl Tool for FnTool {
    fn execute(&self, arguments: Value) -> ToolFuture<'_> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").finish_non_exhaustive()
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

struct RegisteredTool {
    spec: ToolSpec,
    tool: Box<dyn Tool>,
}

/// Tools addressable by name, in registration order.
///
/// Specs are immutable once registered. Dispatch optionally validates
/// arguments against the registered schema, applies a timeout, and
/// truncates oversized results.
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    max_result_bytes: usize,
    /// Whether to validate tool arguments against JSON Schema before execution.
    validate_args: bool,
    /// `None` disables timeouts.
    timeout: Option<Duration>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("validate_args", &self.validate_args)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            timeout: None,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema argument validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a timeout for tool execution. Pass `None` to disable.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether arguments are schema-checked before dispatch.
    pub fn validates_args(&self) -> bool {
        self.validate_args
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Register a tool under its spec's name.
    pub fn register(&mut self, spec: ToolSpec, tool: impl Tool + 'static) -> Result<(), ToolError> {
        if self.index.contains_key(&spec.name) {
            return Err(ToolError::Duplicate(spec.name));
        }
        debug!("Registered tool {}", spec.name);
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push(RegisteredTool {
            spec,
            tool: Box::new(tool),
        });
        Ok(())
    }

    /// Schema export for the request executor, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.entries.iter().map(|e| e.spec.to_tool_def()).collect()
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.entries[i].spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.spec.name.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke a tool by name and return its (possibly truncated) text result.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        if self.validate_args {
            validate_tool_arguments(&entry.spec, &arguments)?;
        }

        log_tool_call(name, &arguments);
        let start = Instant::now();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, entry.tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    info!("Tool {name} timed out after {:.0}s", limit.as_secs_f64());
                    Err(ToolError::failed(format!(
                        "tool '{name}' timed out after {:.0} seconds",
                        limit.as_secs_f64()
                    )))
                }
            },
            None => entry.tool.execute(arguments).await,
        }?;

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        trace!(
            "Tool {name} result preview: {}",
            result.chars().take(300).collect::<String>()
        );

        Ok(truncate_result(result, self.max_result_bytes))
    }

    /// Parse a model-issued call's argument payload and dispatch it.
    pub async fn dispatch_call(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        if !self.contains(call.tool_name()) {
            return Err(ToolError::Unknown(call.tool_name().to_string()));
        }
        let arguments = call.parse_arguments()?;
        self.dispatch(call.tool_name(), arguments).await
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the spec's declared JSON Schema.
///
/// An invalid schema skips validation.
pub fn validate_tool_arguments(spec: &ToolSpec, arguments: &Value) -> Result<(), ToolError> {
    let validator = match jsonschema::validator_for(&spec.parameters) {
        Ok(v) => v,
        Err(_) => return Ok(()),
    };

    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments {
            tool: spec.name.clone(),
            reason: errors.join("; "),
        })
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &Value) {
    let args_preview: String = arguments.to_string().chars().take(120).collect();
    info!("Tool call: {name}({args_preview})");
}

/// Truncate a tool result to at most `max` bytes on a char boundary.
pub fn truncate_result(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    let cut = s.floor_char_boundary(max);
    s.truncate(cut);
    format!("{s}...\n[truncated: {total} bytes total]")
}
