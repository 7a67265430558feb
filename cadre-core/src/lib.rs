mod artifact;
mod error;
mod llm;
pub mod output_parsers;
mod tool;
mod value;

pub use artifact::{Artifact, ArtifactKind};
pub use error::CadreError;
pub use llm::{LlmRequest, LlmResponse, Message, Role, ToolCall, ToolCallingLlm, ToolSpec};
pub use output_parsers::{parse_arguments, parse_tool_call_text, ParsedToolCall};
pub use tool::{OutputType, Tool, ToolError, ToolOutput};
pub use value::{IntoValue, TryFromValue, Value};
