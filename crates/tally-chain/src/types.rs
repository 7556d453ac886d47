use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use tally_types::{Address, TokenAmount, TxHash};

/// A transaction as read back from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract-creation transactions.
    pub to: Option<Address>,
    /// Native value in base units.
    pub value: TokenAmount,
    /// Raw call data.
    pub input: Vec<u8>,
    /// Block the transaction was included in, if mined.
    pub block_number: Option<u64>,
}

/// Execution receipt. Present only once the transaction is mined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Post-Byzantium execution status: true on success.
    pub succeeded: bool,
}

/// Parse a `0x`-prefixed hex quantity (RPC integer encoding) into u128.
pub(crate) fn parse_quantity(s: &str) -> Result<u128> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity missing 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(ChainError::InvalidResponse("empty quantity".into()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {s}: {e}")))
}

/// Parse `0x`-prefixed hex call data into raw bytes.
pub(crate) fn parse_data(s: &str) -> Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("data missing 0x prefix: {s}")))?;
    hex::decode(digits).map_err(|e| ChainError::InvalidResponse(format!("bad call data: {e}")))
}
