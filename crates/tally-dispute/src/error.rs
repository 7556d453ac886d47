use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisputeError {
    #[error("Dispute not found: {0}")]
    NotFound(String),

    /// The dispute has already resolved; further votes change nothing.
    #[error("Dispute already resolved: {0}")]
    AlreadyResolved(String),

    /// The validator has already voted. The first vote is binding.
    #[error("Validator {validator} already voted on dispute {dispute}")]
    DuplicateVote { dispute: String, validator: String },

    #[error("Invalid dispute configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, DisputeError>;
