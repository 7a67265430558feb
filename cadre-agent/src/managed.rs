use cadre_core::Value;
use cadre_prompt::ManagedAgentTemplates;
use futures::future::BoxFuture;
use serde_json::{json, Map};
use tokio::sync::{Mutex, MutexGuard};

use crate::agent::Agent;
use crate::capability::InvokeFailure;
use crate::state::StateValue;

/// An [`Agent`] exposed to a parent agent as a callable capability.
///
/// Each delegation resets the wrapped agent and runs it on the delegated
/// task; only the (optionally summarized) final answer flows back up.
pub struct ManagedAgent {
    name: String,
    description: String,
    provide_run_summary: bool,
    templates: ManagedAgentTemplates,
    agent: Mutex<Agent>,
}

impl std::fmt::Debug for ManagedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("provide_run_summary", &self.provide_run_summary)
            .finish_non_exhaustive()
    }
}

impl ManagedAgent {
    pub fn new(agent: Agent) -> Self {
        Self {
            name: agent.name().to_string(),
            description: agent.description().to_string(),
            provide_run_summary: agent.provide_run_summary(),
            templates: agent.templates().managed_agent.clone(),
            agent: Mutex::new(agent),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn provide_run_summary(&self) -> bool {
        self.provide_run_summary
    }

    /// Exclusive access to the wrapped agent, e.g. to inspect the memory of
    /// its latest delegated run.
    pub async fn lock(&self) -> MutexGuard<'_, Agent> {
        self.agent.lock().await
    }

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Long detailed description of the task."
                },
                "additional_args": {
                    "type": "object",
                    "description": "Named inputs the team member can reference by key."
                }
            },
            "required": ["task"]
        })
    }

    // Boxed because a delegated run re-enters `Agent::run`.
    pub(crate) fn delegate(&self, request: Value) -> BoxFuture<'_, Result<StateValue, InvokeFailure>> {
        Box::pin(async move {
            let (task, additional_args) = parse_request(request).map_err(InvokeFailure::Rejected)?;

            let mut task = self
                .templates
                .task
                .render_pairs(&[("name", self.name.as_str()), ("task", task.as_str())])
                .map_err(|error| InvokeFailure::Failed(Box::new(error)))?;
            if !additional_args.is_empty() {
                let keys: Vec<&str> = additional_args.keys().map(String::as_str).collect();
                task.push_str(&format!(
                    "\n\nYou have been provided with these additional arguments, \
                     which you can pass by key to tools or to final_answer: {}",
                    keys.join(", ")
                ));
            }

            tracing::info!(managed_agent = %self.name, "delegating task");

            let mut agent = self.agent.lock().await;
            agent.reset();
            for (key, value) in additional_args {
                agent.state_mut().insert(key, StateValue::from(value));
            }

            let output = agent
                .run(&task)
                .await
                .map_err(|error| InvokeFailure::Failed(Box::new(error)))?;

            if !self.provide_run_summary {
                if let StateValue::Artifact(_) = output.value {
                    return Ok(output.value);
                }
            }

            let answer = output.value.to_observation_text();
            let mut report = self
                .templates
                .report
                .render_pairs(&[("name", self.name.as_str()), ("final_answer", answer.as_str())])
                .map_err(|error| InvokeFailure::Failed(Box::new(error)))?;

            if self.provide_run_summary {
                report.push_str(&format!(
                    "\n\nFor more detail, find below a summary of this agent's work:\n\
                     <summary_of_work>\n{}\n</summary_of_work>",
                    agent.memory().summary()
                ));
            }

            Ok(StateValue::Text(report))
        })
    }
}

fn parse_request(request: Value) -> Result<(String, Map<String, Value>), String> {
    let (task, additional_args) = match request {
        Value::String(task) => (task, Map::new()),
        Value::Object(mut map) => {
            let additional_args = match map.remove("additional_args") {
                Some(Value::Object(args)) => args,
                Some(Value::Null) | None => Map::new(),
                Some(other) => {
                    return Err(format!("`additional_args` must be an object, got {other}"))
                }
            };
            let task = match map.remove("task").or_else(|| map.remove("request")) {
                Some(Value::String(task)) => task,
                Some(other) => other.to_string(),
                None if map.is_empty() => String::new(),
                None => Value::Object(map).to_string(),
            };
            (task, additional_args)
        }
        other => return Err(format!("expected a `task` string, got {other}")),
    };

    if task.trim().is_empty() {
        return Err("the `task` must not be empty".to_string());
    }
    Ok((task, additional_args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_strings_and_task_objects() {
        assert_eq!(parse_request(json!("find x")).unwrap().0, "find x");
        let (task, args) =
            parse_request(json!({"task": "find x", "additional_args": {"k": 1}})).unwrap();
        assert_eq!(task, "find x");
        assert_eq!(args.get("k"), Some(&json!(1)));
    }

    #[test]
    fn rejects_missing_or_empty_tasks() {
        assert!(parse_request(Value::Null).is_err());
        assert!(parse_request(json!({})).is_err());
        assert!(parse_request(json!({"task": "  "})).is_err());
        assert!(parse_request(json!({"task": "x", "additional_args": 3})).is_err());
    }
}
