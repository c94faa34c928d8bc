//! Tool abstractions for function-calling conversations.
//!
//! Every capability the model can invoke is a [`Tool`] implementor,
//! registered into a [`ToolRegistry`] under a [`ToolSpec`]. The registry
//! owns dispatch by name, optional schema validation of arguments, and
//! result truncation.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based, deserializes arguments into a typed
//!   struct. Best for stateless tools.
//! - **`impl Tool`**: full struct. Best for tools holding state or clients.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`], [`FnTool`].
//! - [`spec`]: [`ToolSpec`] and its builder.
//! - [`demo`]: simulated weather, calculator, clock and search tools.

pub mod core;
pub mod demo;
pub mod spec;

// Re-export commonly used items at the module level.
pub use self::core::{FnTool, Tool, ToolFuture, ToolRegistry};
pub use spec::{ToolSpec, ToolSpecBuilder};
