use std::sync::Arc;

use async_trait::async_trait;
use cadre_core::Value;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::FailureKind;
use crate::memory::MemoryStep;

/// Serializable digest of a step, as emitted to event channels.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RunEvent {
    Planning {
        agent: String,
        before_step: u32,
        plan: String,
    },
    Action {
        agent: String,
        step_number: u32,
        tool: Option<String>,
        arguments: Option<Value>,
        observation: Option<String>,
        failure: Option<FailureKind>,
    },
    FinalAnswer {
        agent: String,
        answer: String,
    },
}

impl RunEvent {
    pub fn from_step(agent: &str, step: &MemoryStep) -> Self {
        let agent = agent.to_string();
        match step {
            MemoryStep::Planning(planning) => RunEvent::Planning {
                agent,
                before_step: planning.before_step,
                plan: planning.plan.clone(),
            },
            MemoryStep::Action(action) => RunEvent::Action {
                agent,
                step_number: action.step_number,
                tool: action.tool_call.as_ref().map(|call| call.name.clone()),
                arguments: action.tool_call.as_ref().map(|call| call.args.clone()),
                observation: action.observation_text(),
                failure: action.failure().map(|failure| failure.kind),
            },
            MemoryStep::FinalAnswer(final_step) => RunEvent::FinalAnswer {
                agent,
                answer: final_step.output.to_observation_text(),
            },
        }
    }
}

/// Observer notified after every step an agent appends to its memory.
#[async_trait]
pub trait StepCallback: Send + Sync {
    async fn on_step(&self, agent: &str, step: &MemoryStep);
}

#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn StepCallback>>,
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl CallbackManager {
    pub fn new(handlers: Vec<Arc<dyn StepCallback>>) -> Self {
        Self { handlers }
    }

    pub fn noop() -> Self {
        Self { handlers: vec![] }
    }

    pub fn is_noop(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn push(&mut self, handler: Arc<dyn StepCallback>) {
        self.handlers.push(handler);
    }

    pub async fn on_step(&self, agent: &str, step: &MemoryStep) {
        for handler in &self.handlers {
            handler.on_step(agent, step).await;
        }
    }
}

#[async_trait]
impl StepCallback for UnboundedSender<RunEvent> {
    async fn on_step(&self, agent: &str, step: &MemoryStep) {
        if self.send(RunEvent::from_step(agent, step)).is_err() {
            tracing::debug!(agent, "run event receiver dropped");
        }
    }
}

/// Adapts a plain closure into a [`StepCallback`].
pub struct FnCallback<F>(pub F);

#[async_trait]
impl<F> StepCallback for FnCallback<F>
where
    F: Fn(&str, &MemoryStep) + Send + Sync,
{
    async fn on_step(&self, agent: &str, step: &MemoryStep) {
        (self.0)(agent, step)
    }
}
