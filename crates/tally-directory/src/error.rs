use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No agent identifier was supplied where one is required.
    #[error("No agent identifier supplied")]
    MissingIdentifier,

    #[error("Agent not found: {0}")]
    NotFound(String),

    /// The agent exists but is disabled and cannot receive routed payments.
    #[error("Agent is inactive: {0}")]
    Inactive(String),

    /// The agent has no payout wallet configured.
    #[error("Agent has no payout wallet configured: {0}")]
    Unconfigured(String),

    #[error("Agent already registered: {0}")]
    AlreadyRegistered(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
