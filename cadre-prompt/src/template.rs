use std::collections::HashMap;

use cadre_core::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::PromptError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, vars: &HashMap<String, Value>) -> Result<String, PromptError> {
        let pattern = Regex::new(r"\{\{\s*(\w+)\s*\}\}")?;
        let rendered = pattern.replace_all(&self.template, |caps: &regex::Captures| {
            let key = &caps[1];
            match vars.get(key) {
                Some(value) => value
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| value.to_string()),
                None => "".to_string(),
            }
        });
        Ok(rendered.to_string())
    }

    pub fn render_pairs(&self, pairs: &[(&str, &str)]) -> Result<String, PromptError> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(*value)))
            .collect();
        self.render(&vars)
    }
}

impl From<&str> for PromptTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
