use std::collections::BTreeMap;
use std::sync::Arc;

use cadre_core::{Tool, ToolSpec, Value};

use crate::agent::FINAL_ANSWER_TOOL;
use crate::capability::{Capability, InvokeFailure};
use crate::error::{AgentError, DispatchError};
use crate::managed::ManagedAgent;
use crate::state::{ScratchState, StateValue};

/// Routes a named invocation to the tool or managed agent registered under
/// that name.
#[derive(Clone, Debug, Default)]
pub struct Dispatcher {
    tools: BTreeMap<String, Capability>,
    managed_agents: BTreeMap<String, Capability>,
}

impl Dispatcher {
    pub fn new(
        tools: Vec<Arc<dyn Tool>>,
        managed_agents: Vec<Arc<ManagedAgent>>,
    ) -> Result<Self, AgentError> {
        let mut dispatcher = Self::default();
        for tool in tools {
            dispatcher.insert(Capability::Tool(tool))?;
        }
        for agent in managed_agents {
            dispatcher.insert(Capability::Agent(agent))?;
        }
        Ok(dispatcher)
    }

    fn insert(&mut self, capability: Capability) -> Result<(), AgentError> {
        let name = capability.name().to_string();
        if name.trim().is_empty() {
            return Err(AgentError::Build(
                "capability name must not be empty or whitespace".to_string(),
            ));
        }
        if name == FINAL_ANSWER_TOOL {
            return Err(AgentError::Build(format!(
                "'{FINAL_ANSWER_TOOL}' is reserved and cannot be registered"
            )));
        }
        if self.contains(&name) {
            return Err(AgentError::Build(format!("duplicate capability name: {name}")));
        }

        match capability {
            Capability::Tool(_) => self.tools.insert(name, capability),
            Capability::Agent(_) => self.managed_agents.insert(name, capability),
        };
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name) || self.managed_agents.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.tools
            .get(name)
            .or_else(|| self.managed_agents.get(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .keys()
            .chain(self.managed_agents.keys())
            .cloned()
            .collect()
    }

    pub fn tools(&self) -> impl Iterator<Item = &Capability> {
        self.tools.values()
    }

    pub fn managed_agents(&self) -> impl Iterator<Item = &Capability> {
        self.managed_agents.values()
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .chain(self.managed_agents.values())
            .map(Capability::spec)
            .collect()
    }

    pub(crate) fn tools_catalog(&self) -> String {
        catalog(self.tools.values())
    }

    pub(crate) fn managed_agents_catalog(&self) -> String {
        catalog(self.managed_agents.values())
    }

    /// Invokes `name` with `arguments`, resolving scratch-state references in
    /// the arguments first. Every failure comes back as a [`DispatchError`].
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        state: &ScratchState,
    ) -> Result<StateValue, DispatchError> {
        let Some(capability) = self.get(name) else {
            let mut available = self.names();
            available.push(FINAL_ANSWER_TOOL.to_string());
            return Err(DispatchError::UnknownCapability {
                name: name.to_string(),
                available,
            });
        };

        let arguments = state.substitute_arguments(arguments);
        tracing::debug!(capability = name, kind = %capability.kind(), "dispatching");

        match capability.invoke(arguments.clone()).await {
            Ok(value) => Ok(value),
            Err(InvokeFailure::Rejected(reason)) => Err(DispatchError::InvalidInvocation {
                name: name.to_string(),
                kind: capability.kind(),
                arguments,
                reason,
                description: capability.description().to_string(),
                parameters: capability.parameters(),
                output_type: capability.output_type(),
            }),
            Err(InvokeFailure::Failed(source)) => Err(DispatchError::ExecutionFailure {
                name: name.to_string(),
                kind: capability.kind(),
                arguments,
                source,
            }),
        }
    }
}

fn catalog<'a>(capabilities: impl Iterator<Item = &'a Capability>) -> String {
    let lines: Vec<String> = capabilities.map(Capability::catalog_entry).collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}
