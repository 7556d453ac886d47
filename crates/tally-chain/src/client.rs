use crate::error::{ChainError, Result};
use crate::types::{parse_data, parse_quantity, ChainTransaction, TransactionReceipt};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_types::{Address, TokenAmount, TxHash};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Configuration for the JSON-RPC ledger client.
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    /// JSON-RPC endpoint URL.
    pub endpoint_url: String,
    /// Request timeout in seconds. A timed-out call surfaces as
    /// `ChainError::Unavailable`, never as a silent verdict.
    pub timeout_secs: u64,
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:8545".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Read-only access to the ledger.
///
/// Implementations never mutate chain state. Finality here means "mined with
/// a successful receipt"; confirmation-depth and reorg tracking are out of
/// scope for this client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch a transaction by hash. `Ok(None)` means the ledger does not
    /// know the hash (including not-yet-mined mempool misses).
    async fn transaction_by_hash(&self, hash: &TxHash) -> Result<Option<ChainTransaction>>;

    /// Fetch the execution receipt. `Ok(None)` until the transaction is mined.
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>>;
}

// ---------------------------------------------------------------------------
// HTTP JSON-RPC implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
    input: String,
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: String,
    status: String,
}

pub struct HttpChainClient {
    config: ChainClientConfig,
    client: reqwest::Client,
}

impl HttpChainClient {
    pub fn new(config: ChainClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<Option<serde_json::Value>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, endpoint = %self.config.endpoint_url, "Ledger RPC call");

        let response = self
            .client
            .post(&self.config.endpoint_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Unavailable(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Unavailable(format!(
                "{method}: HTTP {status}"
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            warn!(method, code = err.code, message = %err.message, "Ledger RPC error");
            return Err(ChainError::Unavailable(format!(
                "{method}: rpc error {}: {}",
                err.code, err.message
            )));
        }

        match envelope.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn transaction_by_hash(&self, hash: &TxHash) -> Result<Option<ChainTransaction>> {
        let result = self
            .call("eth_getTransactionByHash", json!([hash.to_hex()]))
            .await?;

        let Some(value) = result else {
            return Ok(None);
        };

        let raw: RpcTransaction = serde_json::from_value(value)
            .map_err(|e| ChainError::InvalidResponse(format!("transaction body: {e}")))?;

        let to = match raw.to {
            Some(ref to) => Some(
                Address::from_hex(to)
                    .map_err(|e| ChainError::InvalidResponse(format!("to address: {e}")))?,
            ),
            None => None,
        };

        let block_number = match raw.block_number {
            Some(ref bn) => Some(parse_quantity(bn)? as u64),
            None => None,
        };

        Ok(Some(ChainTransaction {
            hash: TxHash::from_hex(&raw.hash)
                .map_err(|e| ChainError::InvalidResponse(format!("tx hash: {e}")))?,
            from: Address::from_hex(&raw.from)
                .map_err(|e| ChainError::InvalidResponse(format!("from address: {e}")))?,
            to,
            value: TokenAmount::from_base_units(parse_quantity(&raw.value)?),
            input: parse_data(&raw.input)?,
            block_number,
        }))
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([hash.to_hex()]))
            .await?;

        let Some(value) = result else {
            return Ok(None);
        };

        let raw: RpcReceipt = serde_json::from_value(value)
            .map_err(|e| ChainError::InvalidResponse(format!("receipt body: {e}")))?;

        Ok(Some(TransactionReceipt {
            tx_hash: TxHash::from_hex(&raw.transaction_hash)
                .map_err(|e| ChainError::InvalidResponse(format!("receipt hash: {e}")))?,
            block_number: parse_quantity(&raw.block_number)? as u64,
            succeeded: parse_quantity(&raw.status)? == 1,
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation for tests and local development
// ---------------------------------------------------------------------------

/// A ledger double backed by in-memory maps. Transactions and receipts are
/// seeded by tests; `set_unavailable` simulates a dead endpoint.
#[derive(Default)]
pub struct MockChainClient {
    transactions: Arc<RwLock<HashMap<TxHash, ChainTransaction>>>,
    receipts: Arc<RwLock<HashMap<TxHash, TransactionReceipt>>>,
    unavailable: AtomicBool,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_transaction(&self, tx: ChainTransaction) {
        let mut txs = self.transactions.write().await;
        txs.insert(tx.hash, tx);
    }

    pub async fn add_receipt(&self, receipt: TransactionReceipt) {
        let mut receipts = self.receipts.write().await;
        receipts.insert(receipt.tx_hash, receipt);
    }

    /// Seed a mined, successful transaction in one step.
    pub async fn add_settled(&self, tx: ChainTransaction) {
        let receipt = TransactionReceipt {
            tx_hash: tx.hash,
            block_number: tx.block_number.unwrap_or(1),
            succeeded: true,
        };
        self.add_transaction(tx).await;
        self.add_receipt(receipt).await;
    }

    /// Seed a mined transaction whose execution reverted.
    pub async fn add_reverted(&self, tx: ChainTransaction) {
        let receipt = TransactionReceipt {
            tx_hash: tx.hash,
            block_number: tx.block_number.unwrap_or(1),
            succeeded: false,
        };
        self.add_transaction(tx).await;
        self.add_receipt(receipt).await;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("mock endpoint down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn transaction_by_hash(&self, hash: &TxHash) -> Result<Option<ChainTransaction>> {
        self.check_available()?;
        let txs = self.transactions.read().await;
        Ok(txs.get(hash).cloned())
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        self.check_available()?;
        let receipts = self.receipts.read().await;
        Ok(receipts.get(hash).cloned())
    }
}
