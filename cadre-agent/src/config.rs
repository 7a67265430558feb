//! YAML description of an agent hierarchy.
//!
//! ```yaml
//! root: chief
//! agents:
//!   chief:
//!     model_id: scripted
//!     managed_agents: [analyst]
//!   analyst:
//!     model_id: scripted
//!     description: Answers questions about reports.
//!     tools: [search]
//!     template_path: prompts/analyst.yaml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cadre_prompt::{PromptError, PromptTemplates};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CapabilityKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to load prompt templates from {path}: {source}")]
    Prompt {
        path: PathBuf,
        #[source]
        source: PromptError,
    },
    #[error("root agent '{0}' is not declared")]
    MissingRoot(String),
    #[error("agent '{agent}' manages unknown agent '{id}'")]
    UnknownAgent { agent: String, id: String },
    #[error("agent '{agent}' uses unknown tool '{id}'")]
    UnknownTool { agent: String, id: String },
    #[error("agent '{agent}' uses unknown model '{id}'")]
    UnknownModel { agent: String, id: String },
    #[error("'{id}' is a {found}, but agent '{agent}' uses it as a {expected}")]
    KindMismatch {
        agent: String,
        id: String,
        expected: CapabilityKind,
        found: CapabilityKind,
    },
    #[error("agent hierarchy contains a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("invalid config for agent '{agent}': {reason}")]
    Invalid { agent: String, reason: String },
}

fn default_description() -> String {
    "A multi-step agent that can perform various tasks.".to_string()
}

fn default_max_steps() -> u32 {
    20
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub model_id: String,
    /// Name the agent is called by; defaults to its id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub planning_interval: Option<u32>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub managed_agents: Vec<String>,
    /// Prompt file, relative to the config file's directory.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    #[serde(default)]
    pub provide_run_summary: bool,
    #[serde(skip)]
    pub templates: PromptTemplates,
}

impl AgentConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            name: None,
            description: default_description(),
            max_steps: default_max_steps(),
            planning_interval: None,
            tools: Vec::new(),
            managed_agents: Vec::new(),
            template_path: None,
            provide_run_summary: false,
            templates: PromptTemplates::default(),
        }
    }

    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyConfig {
    pub root: String,
    pub agents: BTreeMap<String, AgentConfig>,
}

impl HierarchyConfig {
    /// Parses `source`, loading template files relative to `base_dir`.
    pub fn from_yaml_str(source: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: HierarchyConfig = serde_yaml::from_str(source)?;
        for agent in config.agents.values_mut() {
            if let Some(relative) = &agent.template_path {
                let path = base_dir.join(relative);
                agent.templates = PromptTemplates::from_path(&path)
                    .map_err(|source| ConfigError::Prompt { path, source })?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_yaml_str(&source, base_dir)?;
        tracing::debug!(path = %path.display(), agents = config.agents.len(), "loaded hierarchy config");
        Ok(config)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentConfig> {
        self.agents.get(id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.agents.contains_key(&self.root) {
            return Err(ConfigError::MissingRoot(self.root.clone()));
        }

        for (id, agent) in &self.agents {
            if agent.max_steps == 0 {
                return Err(ConfigError::Invalid {
                    agent: id.clone(),
                    reason: "max_steps must be at least 1".to_string(),
                });
            }
            if agent.planning_interval == Some(0) {
                return Err(ConfigError::Invalid {
                    agent: id.clone(),
                    reason: "planning_interval must be at least 1".to_string(),
                });
            }
            if agent.model_id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    agent: id.clone(),
                    reason: "model_id must not be empty".to_string(),
                });
            }
            if let Some(missing) = agent
                .managed_agents
                .iter()
                .find(|managed| !self.agents.contains_key(*managed))
            {
                return Err(ConfigError::UnknownAgent {
                    agent: id.clone(),
                    id: missing.clone(),
                });
            }
        }

        Ok(())
    }
}
