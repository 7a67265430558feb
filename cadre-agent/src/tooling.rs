use std::sync::Arc;

use async_trait::async_trait;
use cadre_core::{OutputType, Tool, ToolError, ToolOutput, TryFromValue, Value};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A tool with typed arguments. Its JSON schema is derived from `Args`.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Args: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn output_type() -> OutputType {
        OutputType::String
    }

    async fn run(&self, args: Self::Args) -> Result<Self::Output, ToolError>;
}

/// Exposes a [`TypedTool`] through the untyped [`Tool`] interface.
pub struct TypedToolAdapter<T> {
    tool: T,
    parameters: Value,
}

impl<T: TypedTool> TypedToolAdapter<T> {
    pub fn new(tool: T) -> Self {
        let parameters = serde_json::to_value(schemars::schema_for!(T::Args))
            .unwrap_or_else(|_| Value::Object(Default::default()));
        Self { tool, parameters }
    }
}

#[async_trait]
impl<T> Tool for TypedToolAdapter<T>
where
    T: TypedTool + 'static,
{
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn output_type(&self) -> OutputType {
        T::output_type()
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let typed_args = T::Args::try_from_value(args)
            .map_err(|error| ToolError::InvalidInput(error.to_string()))?;
        let output = self.tool.run(typed_args).await?;
        Ok(ToolOutput::from(serde_json::to_value(output)?))
    }
}

pub fn typed_tool<T>(tool: T) -> Arc<dyn Tool>
where
    T: TypedTool + 'static,
{
    Arc::new(TypedToolAdapter::new(tool))
}
