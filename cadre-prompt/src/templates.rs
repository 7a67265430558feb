//! The prompt set every agent is primed with. Each field has a working
//! default, so a prompt file only needs to override what it changes.

use serde::{Deserialize, Serialize};

use crate::PromptTemplate;

const DEFAULT_SYSTEM_PROMPT: &str = "You are {{name}}, an expert assistant who solves tasks by calling tools.
On every turn call exactly one tool. You will receive its observation on the next turn.
When you have the answer, call the `final_answer` tool with it. You may pass the name of a stored artifact (for example `image_2.png`) instead of its content.

Available tools:
{{tools}}

Team members you can delegate to (call them like tools with a `task`):
{{managed_agents}}";

const DEFAULT_TASK_INSTRUCTION: &str = "New task:\n{{task}}";

const DEFAULT_INITIAL_PLAN: &str = "You are a world expert at making efficient plans to solve any task using a set of carefully crafted tools.
Here is your task:
{{task}}

You can use these tools and team members:
{{tools}}

Write a concise step-by-step high-level plan. Do not call any tool. After the final step of the plan, write '<end_plan>' and stop.";

const DEFAULT_UPDATE_PLAN_PRE: &str = "You are a world expert at analyzing a situation and planning accordingly. You have been given this task:
{{task}}

Below is the history of your attempts so far. Use it to update your plan.";

const DEFAULT_UPDATE_PLAN_POST: &str = "Given the history above, write an updated step-by-step plan for the task:
{{task}}

You can use these tools and team members:
{{tools}}

You have {{remaining_steps}} steps left. Do not call any tool. After the final step of the plan, write '<end_plan>' and stop.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningTemplates {
    pub initial_plan: PromptTemplate,
    pub update_plan_pre: PromptTemplate,
    pub update_plan_post: PromptTemplate,
}

impl Default for PlanningTemplates {
    fn default() -> Self {
        Self {
            initial_plan: PromptTemplate::new(DEFAULT_INITIAL_PLAN),
            update_plan_pre: PromptTemplate::new(DEFAULT_UPDATE_PLAN_PRE),
            update_plan_post: PromptTemplate::new(DEFAULT_UPDATE_PLAN_POST),
        }
    }
}

/// How a delegated task is phrased for a sub-agent and how its answer is
/// reported back. The defaults pass both through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedAgentTemplates {
    pub task: PromptTemplate,
    pub report: PromptTemplate,
}

impl Default for ManagedAgentTemplates {
    fn default() -> Self {
        Self {
            task: PromptTemplate::new("{{task}}"),
            report: PromptTemplate::new("{{final_answer}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub system_prompt: PromptTemplate,
    pub user_prompt: PromptTemplate,
    pub task_instruction: PromptTemplate,
    pub planning: PlanningTemplates,
    pub managed_agent: ManagedAgentTemplates,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system_prompt: PromptTemplate::new(DEFAULT_SYSTEM_PROMPT),
            user_prompt: PromptTemplate::new(""),
            task_instruction: PromptTemplate::new(DEFAULT_TASK_INSTRUCTION),
            planning: PlanningTemplates::default(),
            managed_agent: ManagedAgentTemplates::default(),
        }
    }
}

#[cfg(feature = "yaml")]
impl PromptTemplates {
    pub fn from_yaml_str(source: &str) -> Result<Self, crate::PromptError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, crate::PromptError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }
}
