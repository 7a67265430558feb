mod error;
mod template;
mod templates;

pub use error::PromptError;
pub use template::PromptTemplate;
pub use templates::{ManagedAgentTemplates, PlanningTemplates, PromptTemplates};
