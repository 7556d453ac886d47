use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a payment claim was rejected. Returned to callers as data, never as
/// a fault: the routing layer decides whether a new claim is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The transaction does not exist on the ledger, or is not yet mined.
    NotFound,
    /// On-chain sender differs from the claimed payer.
    SenderMismatch,
    /// The transfer recipient differs from the resolved payout wallet.
    RecipientMismatch,
    /// Transferred amount differs from the claimed amount (strict policy).
    AmountMismatch,
    /// The call data targets the stablecoin but is not a decodable transfer.
    UndecodableTransfer,
    /// The transaction was mined but reverted.
    TransferReverted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "transaction not found",
            Self::SenderMismatch => "transaction sender does not match the claimed payer",
            Self::RecipientMismatch => "transfer recipient does not match the payout wallet",
            Self::AmountMismatch => "transferred amount does not match the claimed amount",
            Self::UndecodableTransfer => "transaction data is not a recognizable token transfer",
            Self::TransferReverted => "transaction was mined but did not succeed",
        };
        write!(f, "{}", msg)
    }
}
