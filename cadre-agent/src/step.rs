use cadre_core::{
    parse_arguments, parse_tool_call_text, CadreError, LlmRequest, LlmResponse, ToolCall, Value,
};

use crate::agent::{final_answer_spec, Agent, FINAL_ANSWER_TOOL};
use crate::error::{AgentError, FailureKind};
use crate::memory::{ActionStep, Observation, StepFailure};
use crate::state::StateValue;

const STOP_SEQUENCES: [&str; 2] = ["Observation:", "Calling tools:"];

/// What the run loop should do after an action step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Continue,
    Final(StateValue),
}

impl Agent {
    /// One think-act-observe cycle. Recoverable capability failures end up in
    /// `action.observation`; only generation and parsing failures return `Err`.
    pub(crate) async fn step(&mut self, action: &mut ActionStep) -> Result<StepOutcome, AgentError> {
        let messages = self.memory.render();
        action.model_input_messages = messages.len();

        let mut tools = self.dispatcher.tool_specs();
        tools.push(final_answer_spec());
        let request = LlmRequest {
            model: self.model_id.clone(),
            messages,
            tools,
            stop: STOP_SEQUENCES.iter().map(|stop| stop.to_string()).collect(),
        };

        let response = self
            .llm
            .invoke(request)
            .await
            .map_err(|source| AgentError::Generation {
                agent: self.name.clone(),
                step: action.step_number,
                source,
            })?;
        action.model_output = Some(response.content.clone());

        let call = match extract_call(response) {
            Ok(call) => call,
            Err((output, reason)) => {
                action.observation = Some(Observation::Failure(StepFailure {
                    kind: FailureKind::Parsing,
                    message: reason.clone(),
                }));
                return Err(AgentError::Parsing {
                    agent: self.name.clone(),
                    step: action.step_number,
                    output,
                    reason,
                });
            }
        };
        action.tool_call = Some(call.clone());
        tracing::debug!(step = action.step_number, output = %response_text(action), "model output");
        tracing::info!(step = action.step_number, tool = %call.name, "calling capability");

        if call.name == FINAL_ANSWER_TOOL {
            return Ok(self.accept_final_answer(action, call.args));
        }

        let result = self
            .dispatcher
            .invoke(&call.name, call.args, &self.state)
            .await;
        match result {
            Ok(StateValue::Artifact(artifact)) => {
                let kind = artifact.kind;
                let key = self.state.store_artifact(artifact, action.step_number);
                action.observation = Some(Observation::ArtifactRef { key, kind });
            }
            Ok(value) => {
                let text = value.to_observation_text();
                tracing::info!(step = action.step_number, observation = %text, "observation");
                action.observation = Some(Observation::Text(text));
            }
            Err(error) => {
                tracing::warn!(
                    step = action.step_number,
                    capability = %error.name(),
                    kind = ?error.failure_kind(),
                    "capability call failed"
                );
                action.observation = Some(Observation::Failure(StepFailure {
                    kind: error.failure_kind(),
                    message: error.to_string(),
                }));
            }
        }

        Ok(StepOutcome::Continue)
    }

    fn accept_final_answer(&self, action: &mut ActionStep, arguments: Value) -> StepOutcome {
        let answer = self.state.resolve_final(answer_argument(arguments));

        for check in &self.final_answer_checks {
            if let Err(reason) = check(&answer, &self.memory) {
                tracing::warn!(step = action.step_number, reason = %reason, "final answer rejected");
                action.observation = Some(Observation::Failure(StepFailure {
                    kind: FailureKind::InvalidFinalAnswer,
                    message: format!("Check failed for final answer: {reason}"),
                }));
                return StepOutcome::Continue;
            }
        }

        tracing::info!(step = action.step_number, answer = %answer.to_observation_text(), "final answer");
        action.action_output = Some(answer.clone());
        StepOutcome::Final(answer)
    }
}

fn response_text(action: &ActionStep) -> &str {
    action.model_output.as_deref().unwrap_or_default()
}

fn answer_argument(arguments: Value) -> Value {
    match arguments {
        Value::Object(mut map) => match map.remove("answer").or_else(|| map.remove("result")) {
            Some(answer) => answer,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Structured tool calls win over the text grammar. Only the first call is
/// honored.
fn extract_call(response: LlmResponse) -> Result<ToolCall, (String, String)> {
    if response.tool_calls.len() > 1 {
        tracing::warn!(
            count = response.tool_calls.len(),
            "model returned several tool calls; only the first is executed"
        );
    }

    let (id, name, args) = match response.tool_calls.into_iter().next() {
        Some(call) => (call.id, call.name, parse_arguments(call.args)),
        None => {
            let parsed = parse_tool_call_text(&response.content).map_err(|error| {
                let reason = match error {
                    CadreError::ParseFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                (response.content.clone(), reason)
            })?;
            (String::new(), parsed.name, parsed.arguments)
        }
    };

    let id = if id.is_empty() {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    } else {
        id
    };
    Ok(ToolCall { id, name, args })
}
