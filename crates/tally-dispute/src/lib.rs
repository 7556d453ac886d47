pub mod error;
pub mod staking;
pub mod types;

pub use error::{DisputeError, Result};
pub use staking::{RecordingStakingBackend, StakingAction, StakingBackend};
pub use types::{Dispute, DisputeOutcome, DisputeStatus, Resolution, Vote};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_types::{Address, AgentId, DisputeId, TaskId, TokenAmount};
use tokio::sync::RwLock;
use tracing::{error, info};

/// Quorum size and slash magnitude are deployment policy, not code: both are
/// required inputs, validated at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeConfig {
    /// Distinct validator votes required before the dispute resolves.
    pub quorum_votes: u32,
    /// Stake forfeited by the agent when a dispute resolves against it.
    pub slash_amount: TokenAmount,
}

/// Outcome of a vote submission: the resolution, if this vote completed the
/// quorum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// Manages dispute lifecycles: collecting validator votes, reaching a quorum
/// decision, and dispatching the one terminal slash-or-refund action.
pub struct DisputeCoordinator {
    config: DisputeConfig,
    staking: Arc<dyn StakingBackend>,
    disputes: Arc<RwLock<HashMap<DisputeId, Dispute>>>,
    next_id: AtomicU64,
}

impl DisputeCoordinator {
    pub fn new(config: DisputeConfig, staking: Arc<dyn StakingBackend>) -> Result<Self> {
        if config.quorum_votes == 0 {
            return Err(DisputeError::InvalidConfiguration(
                "quorum_votes must be at least 1".into(),
            ));
        }

        Ok(Self {
            config,
            staking,
            disputes: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn quorum_votes(&self) -> u32 {
        self.config.quorum_votes
    }

    /// Raise a dispute against a task.
    pub async fn open(
        &self,
        task: TaskId,
        agent: AgentId,
        reason: String,
        raised_by: Address,
    ) -> Dispute {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = DisputeId::new(format!("dsp-{seq:06}")).expect("generated id is non-empty");

        let dispute = Dispute {
            id: id.clone(),
            task,
            agent,
            reason,
            raised_by,
            status: DisputeStatus::Open,
            votes: HashMap::new(),
            resolution: None,
            raised_at: Utc::now(),
        };

        info!(dispute = %id, task = %dispute.task, agent = %dispute.agent, "Dispute opened");

        let mut disputes = self.disputes.write().await;
        disputes.insert(id, dispute.clone());
        dispute
    }

    /// Submit a validator vote.
    ///
    /// The first vote per validator is binding; repeats are rejected with
    /// `DuplicateVote` and leave the stored vote untouched. Votes after
    /// resolution are rejected with `AlreadyResolved`. The vote that
    /// completes the quorum resolves the dispute and dispatches the staking
    /// side effect once, outside the lock.
    pub async fn vote(
        &self,
        id: &DisputeId,
        validator: Address,
        approve_refund: bool,
        comment: Option<String>,
    ) -> Result<VoteOutcome> {
        let (resolution, task, agent) = {
            let mut disputes = self.disputes.write().await;
            let dispute = disputes
                .get_mut(id)
                .ok_or_else(|| DisputeError::NotFound(id.to_string()))?;

            if dispute.status == DisputeStatus::Resolved {
                return Err(DisputeError::AlreadyResolved(id.to_string()));
            }

            match dispute.votes.entry(validator) {
                Entry::Occupied(_) => {
                    return Err(DisputeError::DuplicateVote {
                        dispute: id.to_string(),
                        validator: validator.to_hex(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(Vote {
                        validator,
                        approve_refund,
                        comment,
                        cast_at: Utc::now(),
                    });
                }
            }

            info!(
                dispute = %id,
                validator = %validator,
                approve_refund,
                votes = dispute.votes.len(),
                quorum = self.config.quorum_votes,
                "Vote recorded"
            );

            if dispute.votes.len() < self.config.quorum_votes as usize {
                return Ok(VoteOutcome {
                    accepted: true,
                    resolution: None,
                });
            }

            Self::resolve(dispute)
        };

        // The state transition is committed; the staking call happens with no
        // lock held and its failure is logged, not propagated.
        self.dispatch(&resolution, &task, &agent).await;

        Ok(VoteOutcome {
            accepted: true,
            resolution: Some(resolution),
        })
    }

    /// Apply the quorum decision. Must be called with the dispute write lock
    /// held and only while the dispute is still open.
    fn resolve(dispute: &mut Dispute) -> (Resolution, TaskId, AgentId) {
        let votes_for = dispute
            .votes
            .values()
            .filter(|v| v.approve_refund)
            .count() as u32;
        let votes_against = dispute.votes.len() as u32 - votes_for;

        // Majority decides; a tie resolves in the requester's favor.
        let outcome = if votes_for >= votes_against {
            DisputeOutcome::Refund
        } else {
            DisputeOutcome::Slash
        };

        let resolution = Resolution {
            outcome,
            votes_for_refund: votes_for,
            votes_against_refund: votes_against,
            resolved_at: Utc::now(),
        };

        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = Some(resolution.clone());

        info!(
            dispute = %dispute.id,
            ?outcome,
            votes_for,
            votes_against,
            "Dispute resolved"
        );

        (resolution, dispute.task.clone(), dispute.agent.clone())
    }

    async fn dispatch(&self, resolution: &Resolution, task: &TaskId, agent: &AgentId) {
        let result = match resolution.outcome {
            DisputeOutcome::Refund => self.staking.refund(task).await,
            DisputeOutcome::Slash => self.staking.slash(agent, self.config.slash_amount).await,
        };

        match result {
            Ok(()) => info!(task = %task, agent = %agent, outcome = ?resolution.outcome, "Staking action dispatched"),
            Err(e) => error!(task = %task, agent = %agent, outcome = ?resolution.outcome, error = %e, "Staking action failed"),
        }
    }

    pub async fn get(&self, id: &DisputeId) -> Option<Dispute> {
        let disputes = self.disputes.read().await;
        disputes.get(id).cloned()
    }

    pub async fn open_disputes(&self) -> Vec<Dispute> {
        let disputes = self.disputes.read().await;
        disputes
            .values()
            .filter(|d| d.status == DisputeStatus::Open)
            .cloned()
            .collect()
    }
}
