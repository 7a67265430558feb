//! Hierarchical tool-calling agents.
//!
//! An [`Agent`] repeatedly asks its model for the next capability call,
//! dispatches it to a primitive [`Tool`](cadre_core::Tool) or to a managed
//! sub-agent, records the observation in its [`AgentMemory`] and stops when the
//! model calls `final_answer` or the step budget runs out.

mod agent;
mod callbacks;
mod capability;
pub mod config;
mod dispatch;
mod error;
pub mod factory;
mod managed;
mod memory;
mod planning;
pub mod registry;
mod state;
mod step;
mod tooling;

pub use agent::{Agent, AgentBuilder, FinalAnswerCheck, RunOutput, FINAL_ANSWER_TOOL};
pub use callbacks::{CallbackManager, FnCallback, RunEvent, StepCallback};
pub use capability::{Capability, CapabilityKind};
pub use config::{AgentConfig, ConfigError, HierarchyConfig};
pub use dispatch::Dispatcher;
pub use error::{AgentError, AgentErrorKind, DispatchError, FailureKind, MemoryError};
pub use factory::{build_agent, build_root, default_agent_factory, AgentParts};
pub use managed::ManagedAgent;
pub use memory::{
    ActionStep, AgentMemory, FinalAnswerStep, MemoryStep, Observation, PlanningStep, StepFailure,
};
pub use registry::{CapabilityRegistry, Registration};
pub use state::{ScratchState, StateValue};
pub use step::StepOutcome;
pub use tooling::{typed_tool, TypedTool, TypedToolAdapter};
