use cadre_core::{LlmRequest, Message};
use chrono::Utc;

use crate::agent::Agent;
use crate::error::AgentError;
use crate::memory::PlanningStep;

const END_PLAN: &str = "<end_plan>";

impl Agent {
    /// Asks the model for a fresh plan before action step `before_step`. The
    /// first plan of a run sees the task; later ones see the history so far.
    pub(crate) async fn plan(&self, task: &str, before_step: u32) -> Result<PlanningStep, AgentError> {
        let catalog = format!(
            "{}\n{}",
            self.dispatcher.tools_catalog(),
            self.dispatcher.managed_agents_catalog()
        );
        let remaining_steps = (self.max_steps - before_step + 1).to_string();
        let vars = [
            ("name", self.name.as_str()),
            ("task", task),
            ("tools", catalog.as_str()),
            ("remaining_steps", remaining_steps.as_str()),
        ];
        let planning = &self.templates.planning;

        let messages = if self.memory.planning_steps().next().is_none() {
            let mut messages = self.memory.render();
            messages.push(Message::user(planning.initial_plan.render_pairs(&vars)?));
            messages
        } else {
            let mut messages = vec![Message::system(planning.update_plan_pre.render_pairs(&vars)?)];
            messages.extend(self.memory.render().into_iter().skip(1));
            messages.push(Message::user(planning.update_plan_post.render_pairs(&vars)?));
            messages
        };

        let request = LlmRequest {
            model: self.model_id.clone(),
            messages,
            tools: Vec::new(),
            stop: vec![END_PLAN.to_string()],
        };
        let response = self
            .llm
            .invoke(request)
            .await
            .map_err(|source| AgentError::Generation {
                agent: self.name.clone(),
                step: before_step,
                source,
            })?;

        let plan = response
            .content
            .split(END_PLAN)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        tracing::info!(before_step, "plan updated");

        Ok(PlanningStep {
            plan,
            before_step,
            created_at: Utc::now(),
        })
    }
}
