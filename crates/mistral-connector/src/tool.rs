use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function the model may call, described by a JSON schema for its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct FunctionDefinition {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
        }
    }

    /// Name used for a host plugin function, `plugin-function` or just `function`.
    pub fn qualified_name(plugin: Option<&str>, function: &str) -> String {
        match plugin {
            Some(plugin) if !plugin.is_empty() => format!("{plugin}-{function}"),
            _ => function.to_string(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach the parameter schema. An empty object schema is dropped, since the
    /// endpoint rejects `{}` for parameterless functions.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = match parameters {
            Value::Object(ref map) if map.is_empty() => None,
            other => Some(other),
        };
        self
    }
}

/// Wire envelope for a tool in a chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub r#type: String,
    pub function: FunctionDefinition,
}

impl From<FunctionDefinition> for Tool {
    fn from(function: FunctionDefinition) -> Self {
        Self {
            r#type: "function".to_string(),
            function,
        }
    }
}

/// A tool call requested by the model. Parsed and surfaced, never executed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_tool_type")]
    pub r#type: String,
    pub function: FunctionCall,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    /// Decode the argument string.
    ///
    /// # Errors
    ///
    /// Fails when the model produced arguments that are not valid JSON.
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}
