use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{Address, RejectReason, TokenAmount, TxHash};

/// How the verifier treats a claimed amount that differs from the amount
/// actually transferred on chain.
///
/// Lenient acceptance of an under-payment is a real financial risk, so the
/// policy is an explicit constructor input rather than a buried default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPolicy {
    /// Mismatched amounts reject the claim.
    Strict,
    /// Mismatched amounts settle at the on-chain amount, with a warning
    /// attached to the verdict and logged.
    Lenient,
}

/// A claimed payment, as submitted by the routing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentClaim {
    pub tx_hash: TxHash,
    pub payer: Address,
    pub amount: TokenAmount,
    /// Resolved payout wallet, when routing knows it. If set, the on-chain
    /// recipient must match.
    #[serde(default)]
    pub payee: Option<Address>,
}

/// Lifecycle status of a stored payment. Claims that fail verification are
/// discarded, never persisted, so stored rows are always `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
}

/// One settled transfer. Append-only: a record is written exactly once and
/// never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub tx_hash: TxHash,
    pub payer: Address,
    pub amount: TokenAmount,
    pub status: PaymentStatus,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn completed(tx_hash: TxHash, payer: Address, amount: TokenAmount) -> Self {
        Self {
            tx_hash,
            payer,
            amount,
            status: PaymentStatus::Completed,
            recorded_at: Utc::now(),
        }
    }
}

/// Outcome of a verification attempt. Rejections carry a machine-readable
/// reason; the lenient amount policy attaches a human-readable warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Verdict {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
            warning: None,
        }
    }

    pub fn accepted_with_warning(warning: String) -> Self {
        Self {
            accepted: true,
            reason: None,
            warning: Some(warning),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            warning: None,
        }
    }
}
