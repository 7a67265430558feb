use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Artifact, Value};

/// Failure raised by a tool. `InvalidInput` means the tool rejected the
/// arguments it was given; every other variant is an execution failure.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ToolError::InvalidInput(_))
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Image,
    Audio,
    Any,
}

impl OutputType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::String => "string",
            OutputType::Integer => "integer",
            OutputType::Number => "number",
            OutputType::Boolean => "boolean",
            OutputType::Object => "object",
            OutputType::Array => "array",
            OutputType::Image => "image",
            OutputType::Audio => "audio",
            OutputType::Any => "any",
        }
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
    Artifact(Artifact),
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        ToolOutput::Text(value)
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        ToolOutput::Text(value.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ToolOutput::Text(text),
            other => ToolOutput::Json(other),
        }
    }
}

impl From<Artifact> for ToolOutput {
    fn from(value: Artifact) -> Self {
        ToolOutput::Artifact(value)
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;
    fn output_type(&self) -> OutputType {
        OutputType::String
    }
    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolError>;
}
