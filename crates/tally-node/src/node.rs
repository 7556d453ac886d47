use crate::config::NodeConfig;
use crate::metrics::Metrics;
use crate::staking::DirectoryStakingBackend;
use crate::tasks::{Task, TaskError, TaskRegistry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_chain::{ChainClient, HttpChainClient};
use tally_directory::{AgentDirectory, AgentRecord, AgentRegistration, DirectoryError};
use tally_dispute::{
    Dispute, DisputeCoordinator, DisputeError, DisputeOutcome, VoteOutcome,
};
use tally_reputation::{
    AttestationEvent, DisputeOutcomeEvent, FeedbackEvent, ReputationEngine, ReputationError,
};
use tally_settlement::{
    MemorySettlementStore, PaymentClaim, PaymentVerifier, SettlementError, SettlementStore, Verdict,
};
use tally_types::{Address, AgentId, DisputeId, EventId, TaskId, TokenAmount, TxHash};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Dispute(#[from] DisputeError),

    #[error(transparent)]
    Reputation(#[from] ReputationError),

    #[error(transparent)]
    Task(#[from] TaskError),

    /// The feedback's payment proof is not in the settlement ledger.
    #[error("Payment proof not found: {0}")]
    UnknownPayment(String),

    #[error("Storage failure: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
    /// Hash of the settled payment that authorizes this review.
    pub payment_tx: TxHash,
}

/// Result of ingesting a reputation event: feedback or attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub accepted: bool,
    /// False when the same event was already applied (idempotent replay).
    pub applied: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationSubmission {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub validator: Address,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub name: String,
    pub agents: usize,
    pub payments: usize,
    pub tasks: usize,
    pub open_disputes: usize,
}

/// The wired settlement core: one instance owns every engine and is shared
/// across request handlers.
pub struct TallyNode {
    config: NodeConfig,
    store: Arc<dyn SettlementStore>,
    verifier: PaymentVerifier,
    pub directory: AgentDirectory,
    pub reputation: ReputationEngine,
    pub disputes: Arc<DisputeCoordinator>,
    pub tasks: TaskRegistry,
    pub metrics: Metrics,
}

impl TallyNode {
    /// Build a node talking to the configured JSON-RPC endpoint.
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let chain = Arc::new(HttpChainClient::new((&config.chain).into())?);
        Self::with_chain(config, chain)
    }

    /// Build a node over an externally supplied ledger client. Integration
    /// tests inject the mock ledger here.
    pub fn with_chain(config: NodeConfig, chain: Arc<dyn ChainClient>) -> anyhow::Result<Self> {
        if config.chain.stablecoin.is_zero() {
            warn!("No stablecoin contract configured; token transfers will not verify");
        }

        let store: Arc<dyn SettlementStore> = Arc::new(MemorySettlementStore::new());
        let verifier = PaymentVerifier::new(
            chain,
            store.clone(),
            config
                .chain
                .verifier_config(config.settlement.amount_policy),
        );

        let directory = AgentDirectory::new((&config.directory).into());
        let reputation = ReputationEngine::new((&config.reputation).into());
        let staking = Arc::new(DirectoryStakingBackend::new(directory.clone()));
        let disputes = Arc::new(DisputeCoordinator::new(
            (&config.dispute).into(),
            staking,
        )?);

        info!(
            name = %config.node.name,
            rpc = %config.chain.rpc_url,
            quorum = config.dispute.quorum_votes,
            "Tally node initialized"
        );

        Ok(Self {
            config,
            store,
            verifier,
            directory,
            reputation,
            disputes,
            tasks: TaskRegistry::new(),
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Verify a claimed payment and settle it. When the claim names an
    /// agent, the payout wallet is resolved up front and the on-chain
    /// recipient must match it.
    pub async fn verify_payment(
        &self,
        tx_hash: TxHash,
        payer: Address,
        amount: TokenAmount,
        agent_id: Option<&AgentId>,
    ) -> Result<Verdict> {
        let payee = match agent_id {
            Some(id) => Some(self.directory.resolve_wallet(Some(id)).await?),
            None => None,
        };

        let claim = PaymentClaim {
            tx_hash,
            payer,
            amount,
            payee,
        };

        let timer = self.metrics.verify_latency.start_timer();
        let result = self.verifier.verify_and_record(&claim).await;
        timer.observe_duration();

        let verdict = result?;
        if verdict.accepted {
            self.metrics.payments_verified.inc();
        } else {
            self.metrics.payments_rejected.inc();
        }
        Ok(verdict)
    }

    pub async fn register_agent(&self, registration: AgentRegistration) -> Result<AgentRecord> {
        Ok(self.directory.register(registration).await?)
    }

    pub async fn get_agent(&self, id: &AgentId) -> Option<AgentRecord> {
        self.directory.get(id).await
    }

    pub async fn resolve_wallet(&self, id: Option<&AgentId>) -> Result<Address> {
        Ok(self.directory.resolve_wallet(id).await?)
    }

    pub async fn resolve_price(&self, id: Option<&AgentId>) -> Result<TokenAmount> {
        Ok(self.directory.resolve_price(id).await?)
    }

    pub async fn reputation_score(&self, id: &AgentId) -> f64 {
        self.reputation.current_score(id).await
    }

    pub async fn create_task(
        &self,
        id: Option<TaskId>,
        description: String,
        agent_id: AgentId,
    ) -> Result<Task> {
        let record = self
            .directory
            .get(&agent_id)
            .await
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))?;
        if !record.active {
            return Err(DirectoryError::Inactive(agent_id.to_string()).into());
        }

        Ok(self.tasks.create(id, description, agent_id).await)
    }

    pub async fn complete_task(&self, id: &TaskId, payment_tx: Option<TxHash>) -> Result<Task> {
        Ok(self.tasks.complete(id, payment_tx).await?)
    }

    pub async fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).await
    }

    /// Apply a reviewer's feedback, gated on a settled payment proof.
    ///
    /// The event id is derived from the task and payment hash, so resubmits
    /// of the same review deduplicate instead of double-counting.
    pub async fn submit_feedback(&self, submission: FeedbackSubmission) -> Result<IngestReceipt> {
        if self.directory.get(&submission.agent_id).await.is_none() {
            return Err(DirectoryError::NotFound(submission.agent_id.to_string()).into());
        }
        if self.tasks.get(&submission.task_id).await.is_none() {
            return Err(TaskError::NotFound(submission.task_id.to_string()).into());
        }
        if !self.store.has(&submission.payment_tx).await? {
            return Err(NodeError::UnknownPayment(submission.payment_tx.to_hex()));
        }

        let event_id = EventId::new(format!(
            "fb-{}-{}",
            submission.task_id, submission.payment_tx
        ))
        .expect("derived id is non-empty");

        let applied = self
            .reputation
            .record_feedback(FeedbackEvent {
                id: event_id,
                agent: submission.agent_id.clone(),
                task: submission.task_id.clone(),
                score: submission.score,
                comment: submission.comment,
                at: Utc::now(),
            })
            .await?;

        if applied.applied {
            self.metrics.feedback_applied.inc();
            self.tasks
                .set_review(&submission.task_id, submission.score)
                .await?;
            self.directory
                .set_reputation(&submission.agent_id, applied.score)
                .await?;
        }

        Ok(IngestReceipt {
            accepted: true,
            applied: applied.applied,
            score: applied.score,
        })
    }

    /// Apply a validator's pass/fail attestation of delivered work. One
    /// attestation per validator per task; repeats deduplicate.
    pub async fn submit_attestation(
        &self,
        submission: AttestationSubmission,
    ) -> Result<IngestReceipt> {
        if self.directory.get(&submission.agent_id).await.is_none() {
            return Err(DirectoryError::NotFound(submission.agent_id.to_string()).into());
        }
        if self.tasks.get(&submission.task_id).await.is_none() {
            return Err(TaskError::NotFound(submission.task_id.to_string()).into());
        }

        let event_id = EventId::new(format!(
            "at-{}-{}",
            submission.task_id, submission.validator
        ))
        .expect("derived id is non-empty");

        let applied = self
            .reputation
            .record_attestation(AttestationEvent {
                id: event_id,
                agent: submission.agent_id.clone(),
                task: submission.task_id,
                validator: submission.validator,
                passed: submission.passed,
                at: Utc::now(),
            })
            .await;

        if applied.applied {
            self.metrics.attestations_applied.inc();
            self.directory
                .set_reputation(&submission.agent_id, applied.score)
                .await?;
        }

        Ok(IngestReceipt {
            accepted: true,
            applied: applied.applied,
            score: applied.score,
        })
    }

    /// Raise a dispute against a task.
    pub async fn raise_dispute(
        &self,
        task_id: TaskId,
        reason: String,
        raised_by: Address,
    ) -> Result<Dispute> {
        // The task-side gate runs first so a task never carries two open
        // disputes, then the coordinator assigns the id.
        let task = self.tasks.begin_dispute(&task_id).await?;
        let dispute = self
            .disputes
            .open(task_id.clone(), task.agent, reason, raised_by)
            .await;
        self.tasks.attach_dispute(&task_id, dispute.id.clone()).await?;

        self.metrics.disputes_opened.inc();
        Ok(dispute)
    }

    pub async fn get_dispute(&self, id: &DisputeId) -> Option<Dispute> {
        self.disputes.get(id).await
    }

    /// Submit a validator vote. The vote that completes the quorum also
    /// closes out the task, feeds the outcome into the reputation engine,
    /// and refreshes the agent's cached score.
    pub async fn vote_on_dispute(
        &self,
        dispute_id: &DisputeId,
        validator: Address,
        approve_refund: bool,
        comment: Option<String>,
    ) -> Result<VoteOutcome> {
        let outcome = self
            .disputes
            .vote(dispute_id, validator, approve_refund, comment)
            .await?;

        if let Some(resolution) = &outcome.resolution {
            self.metrics.disputes_resolved.inc();
            if resolution.outcome == DisputeOutcome::Slash {
                self.metrics.slashes_dispatched.inc();
            }
            self.finalize_resolution(dispute_id, resolution.outcome).await;
        }

        Ok(outcome)
    }

    /// Post-resolution bookkeeping. The resolution itself is already
    /// committed, so failures here are logged, never surfaced as a vote
    /// failure.
    async fn finalize_resolution(&self, dispute_id: &DisputeId, outcome: DisputeOutcome) {
        let Some(dispute) = self.disputes.get(dispute_id).await else {
            warn!(dispute = %dispute_id, "Resolved dispute disappeared before finalization");
            return;
        };

        if let Err(e) = self.tasks.close_dispute(&dispute.task).await {
            warn!(dispute = %dispute_id, task = %dispute.task, error = %e, "Failed to close disputed task");
        }

        let event_id = EventId::new(format!("dispute-{dispute_id}-outcome"))
            .expect("derived id is non-empty");
        let applied = self
            .reputation
            .record_dispute_outcome(DisputeOutcomeEvent {
                id: event_id,
                agent: dispute.agent.clone(),
                dispute: dispute_id.clone(),
                lost: outcome == DisputeOutcome::Slash,
                at: Utc::now(),
            })
            .await;

        if let Err(e) = self
            .directory
            .set_reputation(&dispute.agent, applied.score)
            .await
        {
            warn!(agent = %dispute.agent, error = %e, "Failed to refresh cached reputation");
        }
    }

    pub async fn stats(&self) -> Result<NodeStats> {
        Ok(NodeStats {
            name: self.config.node.name.clone(),
            agents: self.directory.count().await,
            payments: self.store.count().await?,
            tasks: self.tasks.count().await,
            open_disputes: self.disputes.open_disputes().await.len(),
        })
    }
}
