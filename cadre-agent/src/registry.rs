use std::collections::HashMap;
use std::sync::Arc;

use cadre_core::{CadreError, Tool, ToolCallingLlm};

use crate::agent::Agent;
use crate::capability::CapabilityKind;
use crate::error::AgentError;
use crate::factory::{default_agent_factory, AgentParts};

pub type ToolFactory = Box<dyn Fn() -> Result<Arc<dyn Tool>, CadreError> + Send + Sync>;
pub type AgentFactory = Box<dyn Fn(AgentParts) -> Result<Agent, AgentError> + Send + Sync>;

pub enum Registration {
    Tool(ToolFactory),
    Agent(AgentFactory),
}

impl Registration {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Registration::Tool(_) => CapabilityKind::Tool,
            Registration::Agent(_) => CapabilityKind::ManagedAgent,
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Registration").field(&self.kind()).finish()
    }
}

/// Maps capability and model ids to the factories that build them. Populate
/// it once at startup, then share it read-only.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Registration>,
    models: HashMap<String, Arc<dyn ToolCallingLlm>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("tools", &self.tool_ids())
            .field("agents", &self.agent_ids())
            .field("models", &self.models.len())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool<F>(&mut self, id: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Tool>, CadreError> + Send + Sync + 'static,
    {
        self.capabilities
            .insert(id.to_string(), Registration::Tool(Box::new(factory)));
    }

    pub fn register_agent<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(AgentParts) -> Result<Agent, AgentError> + Send + Sync + 'static,
    {
        self.capabilities
            .insert(id.to_string(), Registration::Agent(Box::new(factory)));
    }

    pub fn register_default_agent(&mut self, id: &str) {
        self.register_agent(id, default_agent_factory);
    }

    pub fn register_model(&mut self, id: &str, model: Arc<dyn ToolCallingLlm>) {
        self.models.insert(id.to_string(), model);
    }

    pub fn resolve(&self, id: &str) -> Option<&Registration> {
        self.capabilities.get(id)
    }

    pub fn model(&self, id: &str) -> Option<Arc<dyn ToolCallingLlm>> {
        self.models.get(id).cloned()
    }

    pub fn tool_ids(&self) -> Vec<&str> {
        self.ids_of(CapabilityKind::Tool)
    }

    pub fn agent_ids(&self) -> Vec<&str> {
        self.ids_of(CapabilityKind::ManagedAgent)
    }

    fn ids_of(&self, kind: CapabilityKind) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .capabilities
            .iter()
            .filter(|(_, registration)| registration.kind() == kind)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}
