//! Builds agent trees from a [`HierarchyConfig`] and a [`CapabilityRegistry`].

use std::sync::Arc;

use cadre_core::{Tool, ToolCallingLlm};
use cadre_prompt::PromptTemplates;

use crate::agent::{Agent, AgentBuilder};
use crate::capability::CapabilityKind;
use crate::config::{AgentConfig, ConfigError, HierarchyConfig};
use crate::error::AgentError;
use crate::registry::{CapabilityRegistry, Registration};

/// Everything resolved for one agent, handed to its factory.
pub struct AgentParts {
    pub id: String,
    pub config: AgentConfig,
    pub model: Arc<dyn ToolCallingLlm>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub managed_agents: Vec<Agent>,
    pub templates: PromptTemplates,
}

impl AgentParts {
    pub fn into_builder(self) -> AgentBuilder {
        let name = self.config.display_name(&self.id).to_string();
        let mut builder = Agent::builder(name)
            .description(self.config.description)
            .llm(self.model)
            .model_id(self.config.model_id)
            .tools(self.tools)
            .managed_agents(self.managed_agents)
            .templates(self.templates)
            .max_steps(self.config.max_steps)
            .provide_run_summary(self.config.provide_run_summary);
        if let Some(interval) = self.config.planning_interval {
            builder = builder.planning_interval(interval);
        }
        builder
    }
}

pub fn default_agent_factory(parts: AgentParts) -> Result<Agent, AgentError> {
    parts.into_builder().build()
}

pub fn build_root(
    registry: &CapabilityRegistry,
    config: &HierarchyConfig,
) -> Result<Agent, AgentError> {
    build_agent(registry, config, &config.root)
}

/// Recursively builds `id` and every agent it manages.
pub fn build_agent(
    registry: &CapabilityRegistry,
    config: &HierarchyConfig,
    id: &str,
) -> Result<Agent, AgentError> {
    let mut stack = Vec::new();
    build_node(registry, config, id, &mut stack)
}

fn build_node(
    registry: &CapabilityRegistry,
    config: &HierarchyConfig,
    id: &str,
    stack: &mut Vec<String>,
) -> Result<Agent, AgentError> {
    if stack.iter().any(|ancestor| ancestor == id) {
        let mut path = stack.clone();
        path.push(id.to_string());
        return Err(ConfigError::Cycle { path }.into());
    }

    let parent = stack.last().cloned().unwrap_or_else(|| id.to_string());
    let agent_config = config.agent(id).ok_or_else(|| ConfigError::UnknownAgent {
        agent: parent.clone(),
        id: id.to_string(),
    })?;
    if let Some(Registration::Tool(_)) = registry.resolve(id) {
        return Err(ConfigError::KindMismatch {
            agent: parent,
            id: id.to_string(),
            expected: CapabilityKind::ManagedAgent,
            found: CapabilityKind::Tool,
        }
        .into());
    }

    let model = registry
        .model(&agent_config.model_id)
        .ok_or_else(|| ConfigError::UnknownModel {
            agent: id.to_string(),
            id: agent_config.model_id.clone(),
        })?;

    let tools = agent_config
        .tools
        .iter()
        .map(|tool_id| build_tool(registry, config, id, tool_id))
        .collect::<Result<Vec<_>, _>>()?;

    stack.push(id.to_string());
    let managed_agents = agent_config
        .managed_agents
        .iter()
        .map(|managed_id| build_node(registry, config, managed_id, stack))
        .collect::<Result<Vec<_>, _>>()?;
    stack.pop();

    let parts = AgentParts {
        id: id.to_string(),
        config: agent_config.clone(),
        model,
        tools,
        managed_agents,
        templates: agent_config.templates.clone(),
    };

    tracing::debug!(agent = id, "building agent");
    match registry.resolve(id) {
        Some(Registration::Agent(factory)) => factory(parts),
        _ => default_agent_factory(parts),
    }
}

fn build_tool(
    registry: &CapabilityRegistry,
    config: &HierarchyConfig,
    agent: &str,
    tool_id: &str,
) -> Result<Arc<dyn Tool>, AgentError> {
    match registry.resolve(tool_id) {
        Some(Registration::Tool(factory)) => factory().map_err(|error| {
            AgentError::Build(format!("tool '{tool_id}' could not be created: {error}"))
        }),
        Some(Registration::Agent(_)) => Err(kind_mismatch(agent, tool_id)),
        None if config.agent(tool_id).is_some() => Err(kind_mismatch(agent, tool_id)),
        None => Err(ConfigError::UnknownTool {
            agent: agent.to_string(),
            id: tool_id.to_string(),
        }
        .into()),
    }
}

fn kind_mismatch(agent: &str, id: &str) -> AgentError {
    ConfigError::KindMismatch {
        agent: agent.to_string(),
        id: id.to_string(),
        expected: CapabilityKind::Tool,
        found: CapabilityKind::ManagedAgent,
    }
    .into()
}
