mod common;

use std::sync::{Arc, Mutex};

use cadre_agent::{
    Agent, AgentError, AgentErrorKind, FailureKind, FnCallback, MemoryStep, RunEvent, StateValue,
};
use cadre_core::{Artifact, CadreError, LlmResponse, Role};
use common::{call, final_answer, EchoTool, RepeatLlm, ScriptedLlm};
use serde_json::json;

#[tokio::test]
async fn echo_then_final_answer_takes_two_steps() {
    let llm = ScriptedLlm::new(vec![call("echo", json!("hi")), final_answer(json!("hi"))]);
    let mut agent = Agent::builder("assistant")
        .llm(llm.clone())
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    let output = agent.run("say hi").await.unwrap();

    assert_eq!(output.value, StateValue::Text("hi".to_string()));
    assert_eq!(output.steps, 2);
    let steps: Vec<_> = agent.memory().action_steps().collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].observation_text().as_deref(), Some("hi"));
    assert_eq!(agent.memory().final_answer(), Some(&output.value));

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.iter().any(|spec| spec.name == "final_answer"));
    assert_eq!(requests[0].messages.last().unwrap().content, "New task:\nsay hi");
}

#[tokio::test]
async fn budget_exhaustion_stops_after_exactly_max_steps() {
    let llm = ScriptedLlm::new((0..10).map(|_| call("echo", json!("again"))).collect());
    let mut agent = Agent::builder("looper")
        .llm(llm.clone())
        .tool(Arc::new(EchoTool))
        .max_steps(3)
        .build()
        .unwrap();

    let error = agent.run("never finish").await.unwrap_err();

    assert!(matches!(
        error,
        AgentError::BudgetExhausted { max_steps: 3, .. }
    ));
    assert_eq!(agent.memory().action_steps().count(), 3);
    assert_eq!(llm.requests().len(), 3);
}

#[tokio::test]
async fn step_numbers_increase_by_one_from_one() {
    let llm = ScriptedLlm::new(vec![
        call("echo", json!("a")),
        call("missing", json!({})),
        call("echo", json!("c")),
        final_answer(json!("done")),
    ]);
    let mut agent = Agent::builder("counter")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    agent.run("count").await.unwrap();

    let numbers: Vec<u32> = agent
        .memory()
        .action_steps()
        .map(|step| step.step_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    for step in agent.memory().action_steps() {
        assert!(step.ended_at.unwrap() >= step.started_at);
        assert!(step.model_input_messages >= 2);
    }
}

#[tokio::test]
async fn rendering_is_idempotent() {
    let llm = ScriptedLlm::new(vec![call("echo", json!("a")), final_answer(json!("a"))]);
    let mut agent = Agent::builder("renderer")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();
    agent.run("render").await.unwrap();

    let first = agent.memory().render();
    let second = agent.memory().render();
    assert_eq!(first, second);
    assert_eq!(first[0].role, Role::System);
    assert!(first[0].content.contains("echo"));
}

#[tokio::test]
async fn final_answer_naming_a_state_key_returns_the_stored_value() {
    let llm = ScriptedLlm::new(vec![final_answer(json!("chart.png"))]);
    let mut agent = Agent::builder("reporter").llm(llm).build().unwrap();
    let chart = Artifact::image(vec![0x89, 0x50, 0x4e, 0x47]);
    agent.state_mut().insert("chart.png", chart.clone());

    let output = agent.run("draw").await.unwrap();

    assert_eq!(output.value, StateValue::Artifact(chart));
}

#[tokio::test]
async fn run_requires_reset_between_tasks() {
    let llm = ScriptedLlm::new(vec![final_answer(json!("one")), final_answer(json!("two"))]);
    let mut agent = Agent::builder("reuser").llm(llm).build().unwrap();

    agent.run("first").await.unwrap();
    let error = agent.run("second").await.unwrap_err();
    assert_eq!(error.kind(), AgentErrorKind::MemoryNotReset);

    agent.reset();
    assert!(agent.memory().is_pristine());
    let output = agent.run("second").await.unwrap();
    assert_eq!(output.value, StateValue::Text("two".to_string()));
    assert_eq!(agent.memory().action_steps().count(), 1);
}

#[tokio::test]
async fn generation_failure_aborts_the_run() {
    let llm = ScriptedLlm::with_results(vec![Err(CadreError::LlmProvider(
        "rate limited".to_string(),
    ))]);
    let mut agent = Agent::builder("fragile").llm(llm).build().unwrap();

    let error = agent.run("anything").await.unwrap_err();

    match error {
        AgentError::Generation { step, source, .. } => {
            assert_eq!(step, 1);
            assert!(source.to_string().contains("rate limited"));
        }
        other => panic!("expected generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_output_aborts_with_parsing_error() {
    let llm = ScriptedLlm::new(vec![LlmResponse::text("I think the answer is 4.")]);
    let mut agent = Agent::builder("rambler").llm(llm).build().unwrap();

    let error = agent.run("add 2 and 2").await.unwrap_err();

    assert_eq!(error.kind(), AgentErrorKind::Parsing);
    let step = agent.memory().action_steps().next().unwrap();
    assert_eq!(step.failure().unwrap().kind, FailureKind::Parsing);
    assert!(step.tool_call.is_none());
}

#[tokio::test]
async fn text_tool_calls_are_parsed_when_no_structured_call_is_returned() {
    let llm = ScriptedLlm::new(vec![
        LlmResponse::text(
            "Thought: I should echo.\nAction:\n```json\n{\"name\": \"echo\", \"arguments\": {\"text\": \"plain\"}}\n```",
        ),
        LlmResponse::text("Action: {\"action\": \"final_answer\", \"action_input\": {\"answer\": \"plain\"}}"),
    ]);
    let mut agent = Agent::builder("texter")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    let output = agent.run("echo plain").await.unwrap();

    assert_eq!(output.value, StateValue::Text("plain".to_string()));
    let first = agent.memory().action_steps().next().unwrap();
    assert_eq!(first.tool_call.as_ref().unwrap().name, "echo");
    assert_eq!(first.observation_text().as_deref(), Some("plain"));
}

#[tokio::test]
async fn text_calls_survive_markers_in_strings_and_braces_in_prose() {
    let llm = ScriptedLlm::new(vec![
        LlmResponse::text(
            "Thought: quote the header.\nAction: {\"name\": \"echo\", \"arguments\": {\"text\": \"Action: hold\"}}",
        ),
        LlmResponse::text(
            "I will fill the {slot} now. {\"name\": \"final_answer\", \"arguments\": {\"answer\": \"held\"}}",
        ),
    ]);
    let mut agent = Agent::builder("texter")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    let output = agent.run("quote it").await.unwrap();

    assert_eq!(output.value, StateValue::Text("held".to_string()));
    assert_eq!(output.steps, 2);
    let first = agent.memory().action_steps().next().unwrap();
    assert_eq!(first.observation_text().as_deref(), Some("Action: hold"));
}

#[tokio::test]
async fn only_the_first_of_several_tool_calls_is_executed() {
    let mut response = call("echo", json!("first"));
    response.tool_calls.push(call("echo", json!("second")).tool_calls.remove(0));
    let llm = ScriptedLlm::new(vec![response, final_answer(json!("first"))]);
    let mut agent = Agent::builder("single")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    agent.run("echo").await.unwrap();

    let first = agent.memory().action_steps().next().unwrap();
    assert_eq!(first.observation_text().as_deref(), Some("first"));
}

#[tokio::test]
async fn failed_final_answer_check_is_recoverable() {
    let llm = ScriptedLlm::new(vec![final_answer(json!("")), final_answer(json!("42"))]);
    let mut agent = Agent::builder("checked")
        .llm(llm)
        .final_answer_check(|answer, _memory| match answer.as_text() {
            Some(text) if !text.is_empty() => Ok(()),
            _ => Err("answer must not be empty".to_string()),
        })
        .build()
        .unwrap();

    let output = agent.run("answer").await.unwrap();

    assert_eq!(output.steps, 2);
    let first = agent.memory().action_steps().next().unwrap();
    let failure = first.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::InvalidFinalAnswer);
    assert!(failure.message.contains("must not be empty"));
}

#[tokio::test]
async fn callbacks_observe_every_step_in_order() {
    let llm = ScriptedLlm::new(vec![call("echo", json!("a")), final_answer(json!("a"))]);
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<RunEvent>();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_closure = seen.clone();

    let mut agent = Agent::builder("observed")
        .llm(llm)
        .tool(Arc::new(EchoTool))
        .callback(Arc::new(sender))
        .callback(Arc::new(FnCallback(move |agent: &str, step: &MemoryStep| {
            let label = match step {
                MemoryStep::Planning(_) => "planning",
                MemoryStep::Action(_) => "action",
                MemoryStep::FinalAnswer(_) => "final",
            };
            seen_by_closure
                .lock()
                .unwrap()
                .push(format!("{agent}:{label}"));
        })))
        .build()
        .unwrap();

    agent.run("observe").await.unwrap();
    drop(agent);

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        RunEvent::Action { step_number: 1, tool: Some(tool), observation: Some(observation), failure: None, .. }
            if tool == "echo" && observation == "a"
    ));
    assert!(matches!(&events[2], RunEvent::FinalAnswer { answer, .. } if answer == "a"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["observed:action", "observed:action", "observed:final"]
    );

    let encoded = serde_json::to_value(&events[2]).unwrap();
    assert_eq!(encoded["type"], "final_answer");
    assert_eq!(encoded["data"]["agent"], "observed");
}

#[tokio::test]
async fn independent_agents_run_concurrently() {
    let mut handles = Vec::new();
    for index in 0..4 {
        handles.push(tokio::spawn(async move {
            let answer = format!("answer-{index}");
            let llm = Arc::new(RepeatLlm(final_answer(json!(answer.clone()))));
            let mut agent = Agent::builder(format!("worker-{index}"))
                .llm(llm)
                .build()
                .unwrap();
            let output = agent.run("work").await.unwrap();
            (answer, output.value)
        }));
    }

    for handle in handles {
        let (expected, value) = handle.await.unwrap();
        assert_eq!(value, StateValue::Text(expected));
    }
}

#[test]
fn builder_rejects_invalid_settings() {
    let llm = ScriptedLlm::new(vec![]);
    let missing_llm = Agent::builder("a").build().unwrap_err();
    assert_eq!(missing_llm.kind(), AgentErrorKind::Build);

    let zero_steps = Agent::builder("a")
        .llm(llm.clone())
        .max_steps(0)
        .build()
        .unwrap_err();
    assert_eq!(zero_steps.kind(), AgentErrorKind::Build);

    let zero_interval = Agent::builder("a")
        .llm(llm)
        .planning_interval(0)
        .build()
        .unwrap_err();
    assert_eq!(zero_interval.kind(), AgentErrorKind::Build);
}
