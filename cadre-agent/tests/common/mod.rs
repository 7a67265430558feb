#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cadre_core::{
    CadreError, LlmRequest, LlmResponse, Tool, ToolCallingLlm, ToolError, ToolOutput, Value,
};
use serde_json::json;

/// Replays canned responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, CadreError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_results(responses: Vec<Result<LlmResponse, CadreError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCallingLlm for ScriptedLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, CadreError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CadreError::LlmProvider("script exhausted".to_string())))
    }
}

/// Always asks for the same call.
pub struct RepeatLlm(pub LlmResponse);

#[async_trait]
impl ToolCallingLlm for RepeatLlm {
    async fn invoke(&self, _request: LlmRequest) -> Result<LlmResponse, CadreError> {
        Ok(self.0.clone())
    }
}

pub fn call(name: &str, args: Value) -> LlmResponse {
    LlmResponse::tool_call(format!("call-{name}"), name, args)
}

pub fn final_answer(answer: Value) -> LlmResponse {
    call("final_answer", json!({ "answer": answer }))
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns its input unchanged."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("text must be a string".to_string()))?;
        Ok(ToolOutput::from(text))
    }
}

pub struct FailTool;

#[async_trait]
impl Tool for FailTool {
    fn name(&self) -> &str {
        "fail_tool"
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed("disk on fire".to_string()))
    }
}
