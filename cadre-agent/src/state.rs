use std::collections::BTreeMap;

use cadre_core::{Artifact, ToolOutput, Value};

/// A value held in scratch state or returned as a final answer.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    Text(String),
    Json(Value),
    Artifact(Artifact),
}

impl StateValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(text) => Some(text),
            StateValue::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            StateValue::Artifact(artifact) => Some(artifact),
            _ => None,
        }
    }

    /// Text fed back to a model. Artifacts are summarized, never inlined.
    pub fn to_observation_text(&self) -> String {
        match self {
            StateValue::Text(text) => text.clone(),
            StateValue::Json(Value::String(text)) => text.clone(),
            StateValue::Json(value) => value.to_string(),
            StateValue::Artifact(artifact) => format!(
                "<{} artifact, {} bytes>",
                artifact.kind.stem(),
                artifact.len()
            ),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            StateValue::Text(text) => Value::String(text.clone()),
            StateValue::Json(value) => value.clone(),
            StateValue::Artifact(artifact) => {
                serde_json::to_value(artifact).unwrap_or(Value::Null)
            }
        }
    }
}

impl From<ToolOutput> for StateValue {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => StateValue::Text(text),
            ToolOutput::Json(value) => StateValue::Json(value),
            ToolOutput::Artifact(artifact) => StateValue::Artifact(artifact),
        }
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => StateValue::Text(text),
            other => StateValue::Json(other),
        }
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<Artifact> for StateValue {
    fn from(value: Artifact) -> Self {
        StateValue::Artifact(value)
    }
}

/// Per-agent key/value store. Keys double as references: a string argument or
/// final answer equal to a key stands for the stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScratchState {
    entries: BTreeMap<String, StateValue>,
}

impl ScratchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Option<StateValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stores an artifact produced at `step_number` under a name derived from
    /// its kind, e.g. `image_3.png`, and returns that name.
    pub fn store_artifact(&mut self, artifact: Artifact, step_number: u32) -> String {
        let kind = artifact.kind;
        let mut key = format!("{}_{step_number}.{}", kind.stem(), kind.extension());
        let mut suffix = 1;
        while self.entries.contains_key(&key) {
            suffix += 1;
            key = format!(
                "{}_{step_number}_{suffix}.{}",
                kind.stem(),
                kind.extension()
            );
        }
        self.entries.insert(key.clone(), StateValue::Artifact(artifact));
        key
    }

    /// Replaces a bare string argument, or any string-valued top-level field of
    /// an argument object, that exactly matches a key with the stored value.
    pub fn substitute_arguments(&self, arguments: Value) -> Value {
        match arguments {
            Value::String(text) => match self.entries.get(&text) {
                Some(stored) => stored.to_value(),
                None => Value::String(text),
            },
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| match value {
                        Value::String(text) => match self.entries.get(&text) {
                            Some(stored) => (key, stored.to_value()),
                            None => (key, Value::String(text)),
                        },
                        other => (key, other),
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Resolves a final-answer argument: a string naming a key yields the
    /// stored value itself.
    pub fn resolve_final(&self, value: Value) -> StateValue {
        if let Value::String(text) = &value {
            if let Some(stored) = self.entries.get(text) {
                return stored.clone();
            }
        }
        StateValue::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_keys_are_unique_per_step() {
        let mut state = ScratchState::new();
        let first = state.store_artifact(Artifact::image(vec![1]), 2);
        let second = state.store_artifact(Artifact::image(vec![2]), 2);
        assert_eq!(first, "image_2.png");
        assert_eq!(second, "image_2_2.png");
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn only_exact_string_matches_are_substituted() {
        let mut state = ScratchState::new();
        state.insert("report", "full report text");
        let args = json!({"source": "report", "note": "report!", "count": 3});
        let substituted = state.substitute_arguments(args);
        assert_eq!(
            substituted,
            json!({"source": "full report text", "note": "report!", "count": 3})
        );
        assert_eq!(
            state.substitute_arguments(Value::from("report")),
            Value::from("full report text")
        );
    }

    #[test]
    fn unmatched_final_answer_keeps_its_value() {
        let state = ScratchState::new();
        assert_eq!(state.resolve_final(Value::from("hi")), StateValue::Text("hi".into()));
        assert_eq!(state.resolve_final(json!(4)), StateValue::Json(json!(4)));
    }
}
