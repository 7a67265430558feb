use std::sync::Arc;

use cadre_core::{Tool, ToolCallingLlm, ToolSpec};
use cadre_prompt::PromptTemplates;
use serde_json::json;
use tracing::Instrument;

use crate::callbacks::{CallbackManager, StepCallback};
use crate::dispatch::Dispatcher;
use crate::error::AgentError;
use crate::managed::ManagedAgent;
use crate::memory::{ActionStep, AgentMemory, FinalAnswerStep, MemoryStep};
use crate::state::{ScratchState, StateValue};
use crate::step::StepOutcome;

/// Reserved capability name that ends a run.
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

const DEFAULT_DESCRIPTION: &str = "A multi-step agent that can perform various tasks.";
const DEFAULT_MAX_STEPS: u32 = 20;

/// Validates a proposed final answer. An `Err` is fed back to the model as the
/// observation of that step and the run continues.
pub type FinalAnswerCheck = Arc<dyn Fn(&StateValue, &AgentMemory) -> Result<(), String> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub value: StateValue,
    /// Number of action steps the run took, including the final one.
    pub steps: usize,
}

pub struct Agent {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) llm: Arc<dyn ToolCallingLlm>,
    pub(crate) model_id: String,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) templates: PromptTemplates,
    pub(crate) memory: AgentMemory,
    pub(crate) state: ScratchState,
    pub(crate) max_steps: u32,
    pub(crate) planning_interval: Option<u32>,
    pub(crate) provide_run_summary: bool,
    pub(crate) callbacks: CallbackManager,
    pub(crate) final_answer_checks: Vec<FinalAnswerCheck>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model_id", &self.model_id)
            .field("capabilities", &self.dispatcher.names())
            .field("max_steps", &self.max_steps)
            .field("planning_interval", &self.planning_interval)
            .field("steps_in_memory", &self.memory.steps().len())
            .finish()
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn planning_interval(&self) -> Option<u32> {
        self.planning_interval
    }

    pub fn provide_run_summary(&self) -> bool {
        self.provide_run_summary
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn state(&self) -> &ScratchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ScratchState {
        &mut self.state
    }

    pub fn add_callback(&mut self, callback: Arc<dyn StepCallback>) {
        self.callbacks.push(callback);
    }

    /// Clears memory and scratch state so the agent can take a new task.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.state.clear();
    }

    /// Runs the agent on `task` until it calls `final_answer` or exhausts its
    /// step budget. Memory must be pristine; call [`Agent::reset`] between runs.
    pub async fn run(&mut self, task: &str) -> Result<RunOutput, AgentError> {
        let span = tracing::info_span!(
            "agent_run",
            agent = %self.name,
            model = %self.model_id,
            max_steps = self.max_steps
        );
        self.run_inner(task).instrument(span).await
    }

    async fn run_inner(&mut self, task: &str) -> Result<RunOutput, AgentError> {
        if !self.memory.is_pristine() {
            return Err(AgentError::MemoryNotReset {
                agent: self.name.clone(),
            });
        }

        let instruction = self
            .templates
            .task_instruction
            .render_pairs(&[("name", self.name.as_str()), ("task", task)])?;
        self.memory.set_task(instruction);
        tracing::info!("run started");

        for step_number in 1..=self.max_steps {
            if self.plans_before(step_number) {
                let planning = self.plan(task, step_number).await?;
                tracing::debug!(step = step_number, "plan recorded");
                self.record(MemoryStep::Planning(planning)).await?;
            }

            let mut action = ActionStep::new(step_number);
            let outcome = self.step(&mut action).await;
            action.finish();
            self.record(MemoryStep::Action(action)).await?;

            match outcome {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Final(value)) => {
                    self.record(MemoryStep::FinalAnswer(FinalAnswerStep {
                        output: value.clone(),
                    }))
                    .await?;
                    tracing::info!(steps = step_number, "run finished with final answer");
                    return Ok(RunOutput {
                        value,
                        steps: step_number as usize,
                    });
                }
                Err(error) => {
                    tracing::error!(step = step_number, error = %error, "run aborted");
                    return Err(error);
                }
            }
        }

        tracing::warn!("step budget exhausted without a final answer");
        Err(AgentError::BudgetExhausted {
            agent: self.name.clone(),
            max_steps: self.max_steps,
        })
    }

    fn plans_before(&self, step_number: u32) -> bool {
        match self.planning_interval {
            Some(interval) => (step_number - 1) % interval == 0,
            None => false,
        }
    }

    async fn record(&mut self, step: MemoryStep) -> Result<(), AgentError> {
        self.memory.append(step)?;
        if let Some(step) = self.memory.steps().last() {
            self.callbacks.on_step(&self.name, step).await;
        }
        Ok(())
    }
}

pub(crate) fn final_answer_spec() -> ToolSpec {
    ToolSpec {
        name: FINAL_ANSWER_TOOL.to_string(),
        description: "Provides a final answer to the given problem.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "answer": {
                    "description": "The final answer to the problem, or the name of a stored value."
                }
            },
            "required": ["answer"]
        }),
    }
}

pub struct AgentBuilder {
    name: String,
    description: Option<String>,
    llm: Option<Arc<dyn ToolCallingLlm>>,
    model_id: String,
    tools: Vec<Arc<dyn Tool>>,
    managed_agents: Vec<Agent>,
    templates: PromptTemplates,
    max_steps: u32,
    planning_interval: Option<u32>,
    provide_run_summary: bool,
    callbacks: CallbackManager,
    final_answer_checks: Vec<FinalAnswerCheck>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            llm: None,
            model_id: String::new(),
            tools: Vec::new(),
            managed_agents: Vec::new(),
            templates: PromptTemplates::default(),
            max_steps: DEFAULT_MAX_STEPS,
            planning_interval: None,
            provide_run_summary: false,
            callbacks: CallbackManager::noop(),
            final_answer_checks: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn llm(mut self, llm: Arc<dyn ToolCallingLlm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn managed_agent(mut self, agent: Agent) -> Self {
        self.managed_agents.push(agent);
        self
    }

    pub fn managed_agents(mut self, agents: Vec<Agent>) -> Self {
        self.managed_agents.extend(agents);
        self
    }

    pub fn templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn planning_interval(mut self, interval: u32) -> Self {
        self.planning_interval = Some(interval);
        self
    }

    pub fn provide_run_summary(mut self, provide_run_summary: bool) -> Self {
        self.provide_run_summary = provide_run_summary;
        self
    }

    pub fn callback(mut self, callback: Arc<dyn StepCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn final_answer_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&StateValue, &AgentMemory) -> Result<(), String> + Send + Sync + 'static,
    {
        self.final_answer_checks.push(Arc::new(check));
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Build("agent name must not be empty".to_string()));
        }
        let llm = self
            .llm
            .ok_or_else(|| AgentError::Build(format!("agent '{}' has no llm", self.name)))?;
        if self.max_steps == 0 {
            return Err(AgentError::Build(format!(
                "agent '{}' needs max_steps of at least 1",
                self.name
            )));
        }
        if self.planning_interval == Some(0) {
            return Err(AgentError::Build(format!(
                "agent '{}' has a planning interval of 0",
                self.name
            )));
        }

        let managed_agents = self
            .managed_agents
            .into_iter()
            .map(|agent| Arc::new(ManagedAgent::new(agent)))
            .collect();
        let dispatcher = Dispatcher::new(self.tools, managed_agents)?;

        let tools = dispatcher.tools_catalog();
        let managed = dispatcher.managed_agents_catalog();
        let system_prompt = self.templates.system_prompt.render_pairs(&[
            ("name", self.name.as_str()),
            ("tools", tools.as_str()),
            ("managed_agents", managed.as_str()),
        ])?;
        let user_prompt = self
            .templates
            .user_prompt
            .render_pairs(&[("name", self.name.as_str())])?;

        Ok(Agent {
            description: self
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            llm,
            model_id: self.model_id,
            dispatcher,
            memory: AgentMemory::new(system_prompt, user_prompt),
            templates: self.templates,
            state: ScratchState::new(),
            max_steps: self.max_steps,
            planning_interval: self.planning_interval,
            provide_run_summary: self.provide_run_summary,
            callbacks: self.callbacks,
            final_answer_checks: self.final_answer_checks,
            name: self.name,
        })
    }
}
