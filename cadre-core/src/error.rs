use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadreError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("Parsing failed on output '{output}': {reason}")]
    ParseFailed { output: String, reason: String },
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl CadreError {
    pub fn parse_failed(output: impl Into<String>, reason: impl Into<String>) -> Self {
        CadreError::ParseFailed {
            output: output.into(),
            reason: reason.into(),
        }
    }
}
