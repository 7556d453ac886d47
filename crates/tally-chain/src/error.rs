use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    /// The RPC endpoint could not be reached, timed out, or returned a
    /// transport-level failure. The only retryable class.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered, but with something we cannot interpret.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Call data targeted at the token contract that is not a well-formed
    /// `transfer(address,uint256)` invocation.
    #[error("Undecodable transfer: {0}")]
    UndecodableTransfer(String),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
