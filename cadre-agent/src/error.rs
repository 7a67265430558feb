use cadre_core::{CadreError, OutputType, Value};
use cadre_prompt::PromptError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::config::ConfigError;

/// Classification of a failure recorded on a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownCapability,
    InvalidInvocation,
    ExecutionFailure,
    InvalidFinalAnswer,
    Parsing,
}

impl FailureKind {
    /// Failures the agent absorbs into its conversation and retries itself.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, FailureKind::Parsing)
    }
}

/// Failure of a single capability invocation. Always recoverable: the step
/// engine turns it into the observation of the current step.
#[derive(Debug)]
pub enum DispatchError {
    UnknownCapability {
        name: String,
        available: Vec<String>,
    },
    InvalidInvocation {
        name: String,
        kind: CapabilityKind,
        arguments: Value,
        reason: String,
        description: String,
        parameters: Value,
        output_type: OutputType,
    },
    ExecutionFailure {
        name: String,
        kind: CapabilityKind,
        arguments: Value,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DispatchError {
    pub fn name(&self) -> &str {
        match self {
            DispatchError::UnknownCapability { name, .. }
            | DispatchError::InvalidInvocation { name, .. }
            | DispatchError::ExecutionFailure { name, .. } => name,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DispatchError::UnknownCapability { .. } => FailureKind::UnknownCapability,
            DispatchError::InvalidInvocation { .. } => FailureKind::InvalidInvocation,
            DispatchError::ExecutionFailure { .. } => FailureKind::ExecutionFailure,
        }
    }

    /// Unknown names count as a malformed invocation.
    pub fn is_invalid_invocation(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownCapability { .. } | DispatchError::InvalidInvocation { .. }
        )
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::UnknownCapability { name, available } => write!(
                f,
                "Unknown tool '{name}', should be one of: {}.",
                available.join(", ")
            ),
            DispatchError::InvalidInvocation {
                name,
                kind: CapabilityKind::ManagedAgent,
                arguments,
                reason,
                description,
                ..
            } => write!(
                f,
                "Invalid request to team member '{name}' with arguments {arguments}: {reason}\n\
                 You should call this team member with a valid request.\n\
                 Team member description: {description}"
            ),
            DispatchError::InvalidInvocation {
                name,
                kind: CapabilityKind::Tool,
                arguments,
                reason,
                description,
                parameters,
                output_type,
            } => write!(
                f,
                "Invalid call to tool '{name}' with arguments {arguments}: {reason}\n\
                 You should call this tool with correct input arguments.\n\
                 Expected inputs: {parameters}\n\
                 Returns output type: {output_type}\n\
                 Tool description: '{description}'"
            ),
            DispatchError::ExecutionFailure {
                name,
                kind: CapabilityKind::ManagedAgent,
                arguments,
                source,
            } => write!(
                f,
                "Error executing request to team member '{name}' with arguments {arguments}: {source}\n\
                 Please try again or request to another team member"
            ),
            DispatchError::ExecutionFailure {
                name,
                kind: CapabilityKind::Tool,
                arguments,
                source,
            } => write!(
                f,
                "Error executing tool '{name}' with arguments {arguments}: {source}\n\
                 Please try again or use another tool"
            ),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::ExecutionFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("action step {got} appended out of order (expected {expected})")]
    OutOfOrder { expected: u32, got: u32 },
    #[error("memory already holds a final answer")]
    AfterFinalAnswer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentErrorKind {
    Generation,
    Parsing,
    BudgetExhausted,
    MemoryNotReset,
    Build,
    Config,
    Internal,
}

/// Errors that end a run. Recoverable capability failures never surface here;
/// they are recorded as observations instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Error while generating output for agent '{agent}' at step {step}: {source}")]
    Generation {
        agent: String,
        step: u32,
        #[source]
        source: CadreError,
    },
    #[error("Error while parsing tool call from output of agent '{agent}' at step {step}: {reason}")]
    Parsing {
        agent: String,
        step: u32,
        output: String,
        reason: String,
    },
    #[error("Agent '{agent}' reached max steps ({max_steps}) without a final answer")]
    BudgetExhausted { agent: String, max_steps: u32 },
    #[error("Agent '{agent}' still holds a previous run; call reset() before running again")]
    MemoryNotReset { agent: String },
    #[error("invalid agent setup: {0}")]
    Build(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl AgentError {
    pub fn kind(&self) -> AgentErrorKind {
        match self {
            AgentError::Generation { .. } => AgentErrorKind::Generation,
            AgentError::Parsing { .. } => AgentErrorKind::Parsing,
            AgentError::BudgetExhausted { .. } => AgentErrorKind::BudgetExhausted,
            AgentError::MemoryNotReset { .. } => AgentErrorKind::MemoryNotReset,
            AgentError::Build(_) => AgentErrorKind::Build,
            AgentError::Config(_) => AgentErrorKind::Config,
            AgentError::Prompt(_) | AgentError::Memory(_) => AgentErrorKind::Internal,
        }
    }
}
