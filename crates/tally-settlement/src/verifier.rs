use crate::store::SettlementStore;
use crate::types::{AmountPolicy, PaymentClaim, PaymentRecord, Verdict};
use std::sync::Arc;
use tally_chain::{decode_transfer, ChainClient, ChainError};
use tally_types::{Address, RejectReason};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Settlement store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl SettlementError {
    /// Whether the caller may retry the same claim with backoff. Only
    /// transient ledger unavailability qualifies; everything else needs a
    /// new claim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Chain(e) if e.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Address of the stablecoin contract. Transactions targeting it are
    /// decoded as ERC-20 transfers; anything else is a native transfer.
    pub stablecoin: Address,
    pub amount_policy: AmountPolicy,
}

/// Verifies claimed payments against the ledger and records them exactly
/// once.
///
/// No lock is held across the chain reads; the only write is the store's
/// atomic insert, so concurrent attempts for one hash converge on a single
/// record regardless of interleaving.
pub struct PaymentVerifier {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn SettlementStore>,
    config: VerifierConfig,
}

impl PaymentVerifier {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn SettlementStore>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            chain,
            store,
            config,
        }
    }

    /// Verify a claimed payment and settle it.
    ///
    /// Verification failures come back as a rejected [`Verdict`]; `Err` is
    /// reserved for transport and storage faults. A hash that is already
    /// settled short-circuits to acceptance so retries stay safe.
    pub async fn verify_and_record(&self, claim: &PaymentClaim) -> Result<Verdict> {
        if self.store.has(&claim.tx_hash).await? {
            debug!(tx_hash = %claim.tx_hash, "Payment already settled, idempotent accept");
            return Ok(Verdict::accepted());
        }

        let Some(tx) = self.chain.transaction_by_hash(&claim.tx_hash).await? else {
            info!(tx_hash = %claim.tx_hash, "Rejecting claim: transaction not found");
            return Ok(Verdict::rejected(RejectReason::NotFound));
        };

        // Finality gate: the transaction must be mined and must not have
        // reverted before any of its contents are trusted.
        if tx.block_number.is_none() {
            info!(tx_hash = %claim.tx_hash, "Rejecting claim: transaction not mined");
            return Ok(Verdict::rejected(RejectReason::NotFound));
        }
        match self.chain.transaction_receipt(&claim.tx_hash).await? {
            None => {
                info!(tx_hash = %claim.tx_hash, "Rejecting claim: no receipt");
                return Ok(Verdict::rejected(RejectReason::NotFound));
            }
            Some(receipt) if !receipt.succeeded => {
                info!(tx_hash = %claim.tx_hash, "Rejecting claim: transaction reverted");
                return Ok(Verdict::rejected(RejectReason::TransferReverted));
            }
            Some(_) => {}
        }

        if tx.from != claim.payer {
            info!(
                tx_hash = %claim.tx_hash,
                on_chain = %tx.from,
                claimed = %claim.payer,
                "Rejecting claim: sender mismatch"
            );
            return Ok(Verdict::rejected(RejectReason::SenderMismatch));
        }

        // Stablecoin target: decode the ERC-20 transfer. Any other target is
        // treated as a native-asset transfer and compared on value.
        let (recipient, paid) = if tx.to == Some(self.config.stablecoin) {
            match decode_transfer(&tx.input) {
                Ok(decoded) => (Some(decoded.to), decoded.amount),
                Err(ChainError::UndecodableTransfer(detail)) => {
                    info!(tx_hash = %claim.tx_hash, detail = %detail, "Rejecting claim: undecodable transfer");
                    return Ok(Verdict::rejected(RejectReason::UndecodableTransfer));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            (tx.to, tx.value)
        };

        if let Some(payee) = claim.payee {
            if recipient != Some(payee) {
                info!(
                    tx_hash = %claim.tx_hash,
                    expected = %payee,
                    "Rejecting claim: recipient mismatch"
                );
                return Ok(Verdict::rejected(RejectReason::RecipientMismatch));
            }
        }

        let mut warning = None;
        let mut recorded_amount = claim.amount;
        if paid != claim.amount {
            match self.config.amount_policy {
                AmountPolicy::Strict => {
                    info!(
                        tx_hash = %claim.tx_hash,
                        paid = %paid,
                        claimed = %claim.amount,
                        "Rejecting claim: amount mismatch"
                    );
                    return Ok(Verdict::rejected(RejectReason::AmountMismatch));
                }
                AmountPolicy::Lenient => {
                    warn!(
                        tx_hash = %claim.tx_hash,
                        paid = %paid,
                        claimed = %claim.amount,
                        "Amount mismatch accepted under lenient policy"
                    );
                    warning = Some(format!(
                        "claimed {} but transaction paid {}; settled at the on-chain amount",
                        claim.amount, paid
                    ));
                    recorded_amount = paid;
                }
            }
        }

        let record = PaymentRecord::completed(claim.tx_hash, tx.from, recorded_amount);
        let inserted = self.store.insert_if_absent(record).await?;
        if !inserted {
            // A concurrent verification won the insert race. The payment is
            // settled either way.
            debug!(tx_hash = %claim.tx_hash, "Lost settlement race, idempotent accept");
            return Ok(Verdict::accepted());
        }

        info!(
            tx_hash = %claim.tx_hash,
            payer = %tx.from,
            amount = %recorded_amount,
            "Payment settled"
        );

        Ok(match warning {
            Some(w) => Verdict::accepted_with_warning(w),
            None => Verdict::accepted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettlementStore;
    use tally_chain::{encode_transfer, ChainTransaction, MockChainClient};
    use tally_types::{TokenAmount, TxHash};

    const STABLECOIN: [u8; 20] = [0xC0; 20];

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn hash(byte: u8) -> TxHash {
        TxHash::from_bytes([byte; 32])
    }

    fn stablecoin_tx(hash_byte: u8, from: Address, to: Address, amount: u128) -> ChainTransaction {
        ChainTransaction {
            hash: hash(hash_byte),
            from,
            to: Some(Address::from_bytes(STABLECOIN)),
            value: TokenAmount::ZERO,
            input: encode_transfer(&to, TokenAmount::from_base_units(amount)),
            block_number: Some(100),
        }
    }

    fn native_tx(hash_byte: u8, from: Address, to: Address, value: u128) -> ChainTransaction {
        ChainTransaction {
            hash: hash(hash_byte),
            from,
            to: Some(to),
            value: TokenAmount::from_base_units(value),
            input: Vec::new(),
            block_number: Some(100),
        }
    }

    fn claim(hash_byte: u8, payer: Address, amount: u128) -> PaymentClaim {
        PaymentClaim {
            tx_hash: hash(hash_byte),
            payer,
            amount: TokenAmount::from_base_units(amount),
            payee: None,
        }
    }

    async fn verifier(
        policy: AmountPolicy,
    ) -> (PaymentVerifier, Arc<MockChainClient>, Arc<MemorySettlementStore>) {
        let chain = Arc::new(MockChainClient::new());
        let store = Arc::new(MemorySettlementStore::new());
        let verifier = PaymentVerifier::new(
            chain.clone(),
            store.clone(),
            VerifierConfig {
                stablecoin: Address::from_bytes(STABLECOIN),
                amount_policy: policy,
            },
        );
        (verifier, chain, store)
    }

    #[tokio::test]
    async fn test_stablecoin_transfer_settles() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert!(verdict.reason.is_none());
        let record = store.get(&hash(1)).await.unwrap().unwrap();
        assert_eq!(record.payer, addr(0xAA));
        assert_eq!(record.amount.to_base_units(), 20_000);
    }

    #[tokio::test]
    async fn test_second_call_is_idempotent() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let first = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();
        let second = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(first.accepted && second.accepted);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_claims_settle_once() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let verifier = Arc::new(verifier);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let verifier = verifier.clone();
            handles.push(tokio::spawn(async move {
                verifier
                    .verify_and_record(&claim(1, addr(0xAA), 20_000))
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().accepted);
        }
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_transaction_rejected() {
        let (verifier, _chain, store) = verifier(AmountPolicy::Strict).await;

        let verdict = verifier
            .verify_and_record(&claim(9, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::NotFound));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sender_mismatch_rejected_without_row() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        // Same transaction, replayed with a different claimed payer.
        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xDD), 20_000))
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::SenderMismatch));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_transfer_rejected() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        let mut tx = stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000);
        tx.input.truncate(10);
        chain.add_settled(tx).await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::UndecodableTransfer));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch_strict_rejects() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 15_000))
            .await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::AmountMismatch));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch_lenient_settles_on_chain_amount() {
        let (verifier, chain, store) = verifier(AmountPolicy::Lenient).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 15_000))
            .await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert!(verdict.warning.is_some());
        let record = store.get(&hash(1)).await.unwrap().unwrap();
        assert_eq!(record.amount.to_base_units(), 15_000);
    }

    #[tokio::test]
    async fn test_native_transfer_compares_value() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(native_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recipient_mismatch_when_payee_known() {
        let (verifier, chain, _store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let mut c = claim(1, addr(0xAA), 20_000);
        c.payee = Some(addr(0xEE));
        let verdict = verifier.verify_and_record(&c).await.unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::RecipientMismatch));
    }

    #[tokio::test]
    async fn test_reverted_transaction_rejected() {
        let (verifier, chain, store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_reverted(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::TransferReverted));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_is_retryable_error() {
        let (verifier, chain, _store) = verifier(AmountPolicy::Strict).await;
        chain.set_unavailable(true);

        let err = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_already_settled_skips_reverification() {
        let (verifier, chain, _store) = verifier(AmountPolicy::Strict).await;
        chain
            .add_settled(stablecoin_tx(1, addr(0xAA), addr(0xBB), 20_000))
            .await;

        verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();

        // Ledger goes away; the settled hash still answers from the store.
        chain.set_unavailable(true);
        let verdict = verifier
            .verify_and_record(&claim(1, addr(0xAA), 20_000))
            .await
            .unwrap();
        assert!(verdict.accepted);
    }
}
