//! Tool specifications: the name, description and parameter schema a tool
//! is registered under.
//!
//! A [`ToolSpec`] is fixed at registration time. Its
//! [`to_tool_def`](ToolSpec::to_tool_def) view is what the request executor
//! advertises to the model.

use crate::ToolDef;

/// Name, description and JSON Schema parameters of a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    /// Tool name (must be unique within a registry).
    pub name: String,
    /// One-sentence purpose shown to the model.
    pub description: String,
    /// JSON Schema describing the argument object.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Create a new ToolSpec builder.
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            name: name.into(),
            description: String::new(),
            parameters: None,
            examples: Vec::new(),
        }
    }

    /// Convert to the function-calling definition sent to the API.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(
            self.name.clone(),
            self.description.clone(),
            self.parameters.clone(),
        )
    }
}

/// Builder for [`ToolSpec`].
#[derive(Debug, Clone)]
pub struct ToolSpecBuilder {
    name: String,
    description: String,
    parameters: Option<serde_json::Value>,
    examples: Vec<(String, String)>,
}

impl ToolSpecBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parameters(mut self, params: serde_json::Value) -> Self {
        self.parameters = Some(params);
        self
    }

    /// Derive JSON Schema parameters from a type implementing `schemars::JsonSchema`.
    ///
    /// The schema comes from the same type the tool deserializes its
    /// arguments into, so the two cannot drift apart.
    pub fn parameters_for<T: schemars::JsonSchema>(self) -> Self {
        self.parameters(crate::json_schema_for::<T>())
    }

    /// Append a usage example to the description.
    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push((input.into(), output.into()));
        self
    }

    /// Build the spec. Missing parameters default to an empty object schema.
    pub fn build(self) -> ToolSpec {
        let mut description = self.description;
        if !self.examples.is_empty() {
            description.push_str("\nExamples:");
            for (input, output) in &self.examples {
                description.push_str(&format!("\n  - {input} -> {output}"));
            }
        }
        ToolSpec {
            name: self.name,
            description,
            parameters: self
                .parameters
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
        }
    }
}
