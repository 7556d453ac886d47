use crate::types::PaymentRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tally_types::TxHash;
use tokio::sync::RwLock;

/// Durable record of processed payments, keyed by transaction hash.
///
/// `insert_if_absent` is the linchpin: it MUST be a single atomic
/// check-and-insert (unique-constraint-backed in a database, lock-held entry
/// check in memory), never a separate read followed by a write. Concurrent
/// settlement attempts for one hash race on this call and exactly one wins;
/// the loser observes `inserted == false` and reports success through the
/// idempotent path.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn has(&self, tx_hash: &TxHash) -> Result<bool>;

    /// Insert the record unless a record with the same hash already exists.
    /// Returns whether this call performed the insert.
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<bool>;

    async fn get(&self, tx_hash: &TxHash) -> Result<Option<PaymentRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// In-memory store. The write lock is held across the occupancy check and
/// the insert, which makes the pair atomic within the process.
#[derive(Default)]
pub struct MemorySettlementStore {
    records: Arc<RwLock<HashMap<TxHash, PaymentRecord>>>,
}

impl MemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementStore for MemorySettlementStore {
    async fn has(&self, tx_hash: &TxHash) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records.contains_key(tx_hash))
    }

    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.entry(record.tx_hash) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn get(&self, tx_hash: &TxHash) -> Result<Option<PaymentRecord>> {
        let records = self.records.read().await;
        Ok(records.get(tx_hash).cloned())
    }

    async fn count(&self) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.len())
    }
}
