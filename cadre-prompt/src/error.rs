use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("invalid template pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to read prompt file: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "yaml")]
    #[error("invalid prompt yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
