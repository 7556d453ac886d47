use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Empty identifier")]
    EmptyIdentifier,
}

pub type Result<T> = std::result::Result<T, ParseError>;
