pub mod client;
pub mod error;
pub mod transfer;
pub mod types;

pub use client::{ChainClient, ChainClientConfig, HttpChainClient, MockChainClient};
pub use error::{ChainError, Result};
pub use transfer::{decode_transfer, encode_transfer, DecodedTransfer, TRANSFER_SELECTOR};
pub use types::{ChainTransaction, TransactionReceipt};
