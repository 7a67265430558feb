//! Hierarchical tool-calling agents.
//!
//! This crate re-exports the workspace crates behind one dependency:
//! [`core`] holds the model and tool boundaries, [`prompt`] the prompt
//! templates and, with the `agent` feature, [`agent`] the step engine.

pub use cadre_core as core;
pub use cadre_prompt as prompt;

#[cfg(feature = "agent")]
pub use cadre_agent as agent;

pub mod prelude {
    pub use cadre_core::{
        Artifact, CadreError, LlmRequest, LlmResponse, Message, Role, Tool, ToolCall,
        ToolCallingLlm, ToolError, ToolOutput, Value,
    };
    pub use cadre_prompt::PromptTemplates;

    #[cfg(feature = "agent")]
    pub use cadre_agent::{
        Agent, AgentError, CapabilityRegistry, HierarchyConfig, RunEvent, RunOutput, StateValue,
        StepCallback,
    };
}
