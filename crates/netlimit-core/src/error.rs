use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetLimitError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no process found with name: {name}")]
    NotFound { name: String },
    #[error("process query failed: {0}")]
    PlatformQuery(String),
    #[error("policy execution failed: {0}")]
    PolicyExecution(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
