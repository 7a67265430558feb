use cadre_core::{ArtifactKind, Message, Role, ToolCall};
use chrono::{DateTime, Utc};

use crate::error::{FailureKind, MemoryError};
use crate::state::StateValue;

const RETRY_HINT: &str = "Now let's retry: take care not to repeat previous errors! \
If you have retried several times, try a completely different approach.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// What an action step saw after dispatching its capability call.
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    Text(String),
    ArtifactRef { key: String, kind: ArtifactKind },
    Failure(StepFailure),
}

impl Observation {
    pub fn to_text(&self) -> String {
        match self {
            Observation::Text(text) => text.clone(),
            Observation::ArtifactRef { key, kind } => {
                format!("Stored {} artifact as '{key}' in memory.", kind.stem())
            }
            Observation::Failure(failure) => failure.message.clone(),
        }
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            Observation::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    fn to_message_content(&self) -> String {
        match self {
            Observation::Failure(failure) => {
                format!("Error:\n{}\n{RETRY_HINT}", failure.message)
            }
            other => format!("Observation:\n{}", other.to_text()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanningStep {
    pub plan: String,
    /// Action step the plan was made for.
    pub before_step: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionStep {
    pub step_number: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub model_input_messages: usize,
    pub model_output: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub observation: Option<Observation>,
    /// Set only on the step that produced the final answer.
    pub action_output: Option<StateValue>,
}

impl ActionStep {
    pub fn new(step_number: u32) -> Self {
        Self {
            step_number,
            started_at: Utc::now(),
            ended_at: None,
            model_input_messages: 0,
            model_output: None,
            tool_call: None,
            observation: None,
            action_output: None,
        }
    }

    pub fn observation_text(&self) -> Option<String> {
        self.observation.as_ref().map(Observation::to_text)
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        self.observation.as_ref().and_then(Observation::failure)
    }

    pub(crate) fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinalAnswerStep {
    pub output: StateValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MemoryStep {
    Planning(PlanningStep),
    Action(ActionStep),
    FinalAnswer(FinalAnswerStep),
}

/// Append-only step log of one agent, plus its fixed priming text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentMemory {
    system_prompt: String,
    user_prompt: String,
    task: Option<String>,
    steps: Vec<MemoryStep>,
}

impl AgentMemory {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            task: None,
            steps: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn steps(&self) -> &[MemoryStep] {
        &self.steps
    }

    pub fn action_steps(&self) -> impl Iterator<Item = &ActionStep> {
        self.steps.iter().filter_map(|step| match step {
            MemoryStep::Action(action) => Some(action),
            _ => None,
        })
    }

    pub fn planning_steps(&self) -> impl Iterator<Item = &PlanningStep> {
        self.steps.iter().filter_map(|step| match step {
            MemoryStep::Planning(planning) => Some(planning),
            _ => None,
        })
    }

    pub fn final_answer(&self) -> Option<&StateValue> {
        self.steps.iter().rev().find_map(|step| match step {
            MemoryStep::FinalAnswer(final_step) => Some(&final_step.output),
            _ => None,
        })
    }

    pub fn last_step_number(&self) -> u32 {
        self.action_steps()
            .last()
            .map(|step| step.step_number)
            .unwrap_or(0)
    }

    pub fn is_pristine(&self) -> bool {
        self.task.is_none() && self.steps.is_empty()
    }

    pub(crate) fn set_task(&mut self, instruction: String) {
        self.task = Some(instruction);
    }

    pub(crate) fn append(&mut self, step: MemoryStep) -> Result<(), MemoryError> {
        if self.final_answer().is_some() {
            return Err(MemoryError::AfterFinalAnswer);
        }
        if let MemoryStep::Action(action) = &step {
            let expected = self.last_step_number() + 1;
            if action.step_number != expected {
                return Err(MemoryError::OutOfOrder {
                    expected,
                    got: action.step_number,
                });
            }
        }
        self.steps.push(step);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.task = None;
        self.steps.clear();
    }

    /// Maps the log onto chat messages. Pure: rendering twice without an
    /// append in between yields identical sequences.
    pub fn render(&self) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt.clone())];
        if !self.user_prompt.is_empty() {
            messages.push(Message::user(self.user_prompt.clone()));
        }
        if let Some(task) = &self.task {
            messages.push(Message::user(task.clone()));
        }

        for step in &self.steps {
            match step {
                MemoryStep::Planning(planning) => {
                    messages.push(Message::assistant(format!("Plan:\n{}", planning.plan)));
                }
                MemoryStep::Action(action) => render_action(action, &mut messages),
                MemoryStep::FinalAnswer(_) => {}
            }
        }

        messages
    }

    /// Plain-text digest of the run, used as a managed agent's summary of work.
    pub fn summary(&self) -> String {
        self.render()
            .into_iter()
            .skip(1)
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let calls = message
                    .tool_calls
                    .iter()
                    .map(|call| format!("\n[called {} with {}]", call.name, call.args))
                    .collect::<String>();
                format!("{role}: {}{calls}", message.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_action(action: &ActionStep, messages: &mut Vec<Message>) {
    let content = action.model_output.clone().unwrap_or_default();
    match &action.tool_call {
        Some(call) => {
            messages.push(Message {
                role: Role::Assistant,
                content,
                tool_call_id: None,
                tool_calls: vec![call.clone()],
            });
            if let Some(observation) = &action.observation {
                messages.push(Message::tool_result(
                    call.id.clone(),
                    observation.to_message_content(),
                ));
            }
        }
        None => {
            messages.push(Message::assistant(content));
            if let Some(observation) = &action.observation {
                messages.push(Message::user(observation.to_message_content()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(step_number: u32, observation: &str) -> MemoryStep {
        let mut step = ActionStep::new(step_number);
        step.model_output = Some(String::new());
        step.tool_call = Some(ToolCall {
            id: format!("call-{step_number}"),
            name: "echo".to_string(),
            args: json!({"text": observation}),
        });
        step.observation = Some(Observation::Text(observation.to_string()));
        MemoryStep::Action(step)
    }

    #[test]
    fn rejects_out_of_order_action_steps() {
        let mut memory = AgentMemory::new("sys", "");
        memory.append(action(1, "a")).unwrap();
        assert_eq!(
            memory.append(action(3, "c")),
            Err(MemoryError::OutOfOrder {
                expected: 2,
                got: 3
            })
        );
        assert_eq!(
            memory.append(action(1, "again")),
            Err(MemoryError::OutOfOrder {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn rejects_steps_after_final_answer() {
        let mut memory = AgentMemory::new("sys", "");
        memory
            .append(MemoryStep::FinalAnswer(FinalAnswerStep {
                output: StateValue::from("done"),
            }))
            .unwrap();
        assert_eq!(memory.append(action(1, "a")), Err(MemoryError::AfterFinalAnswer));
    }

    #[test]
    fn action_step_renders_call_then_observation() {
        let mut memory = AgentMemory::new("sys", "prime");
        memory.set_task("New task:\nsay hi".to_string());
        memory.append(action(1, "hi")).unwrap();

        let messages = memory.render();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "prime");
        assert_eq!(messages[2].content, "New task:\nsay hi");
        assert_eq!(messages[3].role, Role::Assistant);
        assert_eq!(messages[3].tool_calls[0].name, "echo");
        assert_eq!(messages[4].role, Role::Tool);
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(messages[4].content, "Observation:\nhi");
    }

    #[test]
    fn failures_render_with_retry_hint() {
        let mut memory = AgentMemory::new("sys", "");
        let mut step = ActionStep::new(1);
        step.tool_call = Some(ToolCall {
            id: "c".to_string(),
            name: "x".to_string(),
            args: json!({}),
        });
        step.observation = Some(Observation::Failure(StepFailure {
            kind: FailureKind::ExecutionFailure,
            message: "boom".to_string(),
        }));
        memory.append(MemoryStep::Action(step)).unwrap();
        let last = memory.render().pop().unwrap();
        assert!(last.content.starts_with("Error:\nboom"));
        assert!(last.content.contains("retry"));
    }

    #[test]
    fn reset_clears_task_and_steps() {
        let mut memory = AgentMemory::new("sys", "");
        memory.set_task("t".to_string());
        memory.append(action(1, "a")).unwrap();
        memory.reset();
        assert!(memory.is_pristine());
        assert_eq!(memory.render().len(), 1);
    }
}
