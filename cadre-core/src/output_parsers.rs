//! Text grammar for tool calls that a model wrote into its content instead of
//! returning them as structured tool calls.
//!
//! Accepted shape: optional prose, an optional `Action:` marker, then a JSON
//! object (optionally fenced in ```` ```json ````) carrying the capability name
//! under `name`, `tool` or `action` and its arguments under `arguments`, `args`
//! or `action_input`.

use serde_json::Map;

use crate::{CadreError, Value};

const ACTION_MARKER: &str = "Action:";
const NAME_KEYS: [&str; 3] = ["name", "tool", "action"];
const ARGUMENT_KEYS: [&str; 3] = ["arguments", "args", "action_input"];

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Scans every `{` in order and keeps the JSON objects that name a tool. The
/// first one introduced by an `Action:` marker wins, otherwise the first one
/// found. Text inside an accepted object is never searched for markers.
pub fn parse_tool_call_text(text: &str) -> Result<ParsedToolCall, CadreError> {
    let mut first_call: Option<ParsedToolCall> = None;
    let mut failure = "no JSON object found".to_string();
    let mut gap_start = 0;
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find('{') {
        let start = cursor + found;
        let Some(blob) = balanced_object(&text[start..]) else {
            cursor = start + 1;
            continue;
        };
        let object = match serde_json::from_str::<Map<String, Value>>(blob) {
            Ok(object) => object,
            Err(err) => {
                failure = format!("invalid JSON blob: {err}");
                cursor = start + 1;
                continue;
            }
        };
        let end = start + blob.len();

        match tool_call(object) {
            Some(call) if follows_marker(&text[gap_start..start]) => return Ok(call),
            Some(call) => {
                first_call.get_or_insert(call);
            }
            None => failure = "JSON blob does not name a tool (expected `name`)".to_string(),
        }
        gap_start = end;
        cursor = end;
    }

    first_call.ok_or_else(|| CadreError::parse_failed(text, failure))
}

fn tool_call(object: Map<String, Value>) -> Option<ParsedToolCall> {
    let name = NAME_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    let arguments = ARGUMENT_KEYS
        .iter()
        .find_map(|key| object.get(*key).cloned())
        .map(parse_arguments)
        .unwrap_or_else(|| Value::Object(Map::new()));

    Some(ParsedToolCall {
        name: name.to_string(),
        arguments,
    })
}

/// True when `gap` ends with an `Action:` marker, allowing whitespace and a
/// code fence between the marker and the object.
fn follows_marker(gap: &str) -> bool {
    let trimmed = gap.trim_end();
    let trimmed = trimmed
        .strip_suffix("```json")
        .or_else(|| trimmed.strip_suffix("```"))
        .unwrap_or(trimmed);
    trimmed.trim_end().ends_with(ACTION_MARKER)
}

/// String payloads are decoded as JSON when they parse; otherwise the raw
/// string is passed through unchanged.
pub fn parse_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(raw),
        },
        other => other,
    }
}

/// The balanced `{...}` prefix of `text`, which must start with `{`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
