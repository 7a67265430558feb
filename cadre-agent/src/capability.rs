use std::sync::Arc;

use cadre_core::{OutputType, Tool, ToolError, ToolSpec, Value};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::managed::ManagedAgent;
use crate::state::StateValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    ManagedAgent,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Tool => f.write_str("tool"),
            CapabilityKind::ManagedAgent => f.write_str("managed agent"),
        }
    }
}

/// Anything an agent can call by name: a primitive tool or a sub-agent.
#[derive(Clone)]
pub enum Capability {
    Tool(Arc<dyn Tool>),
    Agent(Arc<ManagedAgent>),
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Why an invocation did not produce a value. `Rejected` means the arguments
/// were refused before or by the capability; `Failed` means it ran and broke.
#[derive(Debug)]
pub(crate) enum InvokeFailure {
    Rejected(String),
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl From<ToolError> for InvokeFailure {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::InvalidInput(reason) => InvokeFailure::Rejected(reason),
            other => InvokeFailure::Failed(Box::new(other)),
        }
    }
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::Tool(tool) => tool.name(),
            Capability::Agent(agent) => agent.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Capability::Tool(tool) => tool.description(),
            Capability::Agent(agent) => agent.description(),
        }
    }

    pub fn parameters(&self) -> Value {
        match self {
            Capability::Tool(tool) => tool.parameters(),
            Capability::Agent(_) => ManagedAgent::parameters(),
        }
    }

    pub fn output_type(&self) -> OutputType {
        match self {
            Capability::Tool(tool) => tool.output_type(),
            Capability::Agent(_) => OutputType::String,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Tool(_) => CapabilityKind::Tool,
            Capability::Agent(_) => CapabilityKind::ManagedAgent,
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// One catalog line for the system prompt.
    pub fn catalog_entry(&self) -> String {
        format!(
            "- {}: {}\n    Takes inputs: {}\n    Returns an output of type: {}",
            self.name(),
            self.description(),
            self.parameters(),
            self.output_type()
        )
    }

    pub(crate) async fn invoke(&self, arguments: Value) -> Result<StateValue, InvokeFailure> {
        match self {
            Capability::Tool(tool) => {
                let arguments = prepare_tool_arguments(&tool.parameters(), arguments)
                    .map_err(InvokeFailure::Rejected)?;
                let output = tool.invoke(arguments).await?;
                Ok(StateValue::from(output))
            }
            Capability::Agent(agent) => agent.delegate(arguments).await,
        }
    }
}

/// Normalizes model-produced arguments and validates them against the tool's
/// JSON schema. A null payload becomes `{}`; a bare scalar is wrapped when the
/// schema declares a single property.
pub(crate) fn prepare_tool_arguments(schema: &Value, arguments: Value) -> Result<Value, String> {
    let properties = schema.get("properties").and_then(Value::as_object);

    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
            match properties.filter(|properties| properties.len() == 1) {
                Some(properties) => {
                    let mut map = Map::new();
                    if let Some(key) = properties.keys().next() {
                        map.insert(key.clone(), scalar);
                    }
                    Value::Object(map)
                }
                None => scalar,
            }
        }
        other => other,
    };

    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(error) => {
            tracing::warn!(error = %error, "tool declares an unusable schema; skipping validation");
            return Ok(arguments);
        }
    };
    let messages: Vec<String> = validator
        .iter_errors(&arguments)
        .map(|error| error.to_string())
        .collect();
    if messages.is_empty() {
        Ok(arguments)
    } else {
        Err(format!("arguments do not match the schema: {}", messages.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"],
            "additionalProperties": false
        })
    }

    #[test]
    fn wraps_a_bare_scalar_for_single_argument_tools() {
        let prepared = prepare_tool_arguments(&schema(), json!("hello")).unwrap();
        assert_eq!(prepared, json!({"text": "hello"}));
    }

    #[test]
    fn rejects_missing_and_unexpected_arguments() {
        let missing = prepare_tool_arguments(&schema(), json!({})).unwrap_err();
        assert!(missing.contains("text"));
        let extra = prepare_tool_arguments(&schema(), json!({"text": "a", "b": 1})).unwrap_err();
        assert!(extra.contains("'b'"));
    }

    #[test]
    fn rejects_mistyped_arguments() {
        let error = prepare_tool_arguments(&schema(), json!({"text": 4})).unwrap_err();
        assert!(error.contains("string"));
    }

    #[test]
    fn enforces_enums_bounds_and_nested_objects() {
        let schema = json!({
            "type": "object",
            "properties": {
                "mode": {"type": "string", "enum": ["fast", "slow"]},
                "n": {"type": "integer", "minimum": 1},
                "window": {
                    "type": "object",
                    "properties": {"from": {"type": "integer"}},
                    "required": ["from"]
                }
            }
        });

        let error = prepare_tool_arguments(&schema, json!({"mode": "warp", "n": -5})).unwrap_err();
        assert!(error.contains("warp"));
        assert!(error.contains("-5"));
        assert!(prepare_tool_arguments(&schema, json!({"window": {}})).is_err());
        assert!(prepare_tool_arguments(&schema, json!({"mode": "fast", "n": 2, "window": {"from": 0}})).is_ok());
    }

    #[test]
    fn schemaless_tools_take_any_payload() {
        assert_eq!(prepare_tool_arguments(&json!({}), json!("raw")).unwrap(), json!("raw"));
        assert_eq!(prepare_tool_arguments(&json!({}), Value::Null).unwrap(), json!({}));
    }

    #[test]
    fn accepts_union_types_and_open_schemas() {
        let schema = json!({"properties": {"n": {"type": ["integer", "null"]}}});
        assert!(prepare_tool_arguments(&schema, json!({"n": null})).is_ok());
        assert!(prepare_tool_arguments(&schema, json!({"n": 3, "other": true})).is_ok());
        assert_eq!(
            prepare_tool_arguments(&schema, Value::Null).unwrap(),
            json!({})
        );
    }
}
