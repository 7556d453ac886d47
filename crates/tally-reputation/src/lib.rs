pub mod events;

pub use events::{AttestationEvent, DisputeOutcomeEvent, FeedbackEvent, MAX_SCORE, MIN_SCORE};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tally_types::{AgentId, EventId};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReputationError {
    #[error("Feedback score {0} outside the accepted range 1..=5")]
    ScoreOutOfRange(u8),
}

pub type Result<T> = std::result::Result<T, ReputationError>;

/// Weighting of the score components. `feedback_weight` and
/// `attestation_weight` should sum to 1; the prior damps early swings so a
/// single review cannot whipsaw a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    pub feedback_weight: f64,
    pub attestation_weight: f64,
    /// Fixed score penalty per lost dispute.
    pub dispute_penalty: f64,
    /// Prior mean feedback score, on the 1..=5 scale.
    pub prior_score: f64,
    /// Pseudo-observation count backing the prior.
    pub prior_weight: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            feedback_weight: 0.7,
            attestation_weight: 0.3,
            dispute_penalty: 0.5,
            prior_score: 3.0,
            prior_weight: 5.0,
        }
    }
}

/// Raw event history for one agent. The score is derived from these sets and
/// never stored as independent truth.
#[derive(Debug, Default, Clone)]
struct AgentLedger {
    seen: HashSet<EventId>,
    feedback: Vec<FeedbackEvent>,
    attestations: Vec<AttestationEvent>,
    dispute_outcomes: Vec<DisputeOutcomeEvent>,
}

/// Result of ingesting one event: whether it was new, and the score after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    pub applied: bool,
    pub score: f64,
}

/// Folds feedback, attestations, and dispute outcomes into a running score
/// per agent.
///
/// Aggregation is over sets keyed by event id, so ingestion commutes:
/// concurrent events, replays, and late arrivals all converge to the same
/// score. Ingesting an already-seen id is a no-op.
#[derive(Clone)]
pub struct ReputationEngine {
    ledgers: Arc<RwLock<HashMap<AgentId, AgentLedger>>>,
    config: ReputationConfig,
}

impl ReputationEngine {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            ledgers: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn record_feedback(&self, event: FeedbackEvent) -> Result<Applied> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&event.score) {
            return Err(ReputationError::ScoreOutOfRange(event.score));
        }

        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(event.agent.clone()).or_default();

        if !ledger.seen.insert(event.id.clone()) {
            debug!(agent = %event.agent, event = %event.id, "Duplicate feedback ignored");
            return Ok(Applied {
                applied: false,
                score: self.compute(ledger),
            });
        }

        ledger.feedback.push(event);
        let score = self.compute(ledger);
        Ok(Applied {
            applied: true,
            score,
        })
    }

    pub async fn record_attestation(&self, event: AttestationEvent) -> Applied {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(event.agent.clone()).or_default();

        if !ledger.seen.insert(event.id.clone()) {
            debug!(agent = %event.agent, event = %event.id, "Duplicate attestation ignored");
            return Applied {
                applied: false,
                score: self.compute(ledger),
            };
        }

        ledger.attestations.push(event);
        Applied {
            applied: true,
            score: self.compute(ledger),
        }
    }

    pub async fn record_dispute_outcome(&self, event: DisputeOutcomeEvent) -> Applied {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(event.agent.clone()).or_default();

        if !ledger.seen.insert(event.id.clone()) {
            debug!(agent = %event.agent, event = %event.id, "Duplicate dispute outcome ignored");
            return Applied {
                applied: false,
                score: self.compute(ledger),
            };
        }

        ledger.dispute_outcomes.push(event);
        Applied {
            applied: true,
            score: self.compute(ledger),
        }
    }

    /// Current score for an agent on the 0..=5 scale. Unknown agents sit at
    /// the prior.
    pub async fn current_score(&self, agent: &AgentId) -> f64 {
        let ledgers = self.ledgers.read().await;
        match ledgers.get(agent) {
            Some(ledger) => self.compute(ledger),
            None => self.compute(&AgentLedger::default()),
        }
    }

    /// Number of distinct events ingested for an agent.
    pub async fn event_count(&self, agent: &AgentId) -> usize {
        let ledgers = self.ledgers.read().await;
        ledgers.get(agent).map(|l| l.seen.len()).unwrap_or(0)
    }

    /// Recompute the materialized score from raw events.
    ///
    /// Every term is a function of unordered event sets, so the result is
    /// independent of ingestion order, and one additional event moves each
    /// term by a bounded amount.
    fn compute(&self, ledger: &AgentLedger) -> f64 {
        let c = &self.config;

        let n = ledger.feedback.len() as f64;
        let sum: f64 = ledger.feedback.iter().map(|f| f.score as f64).sum();
        let mean_feedback = (c.prior_score * c.prior_weight + sum) / (c.prior_weight + n);

        let attested = ledger.attestations.len() as f64;
        let passed = ledger.attestations.iter().filter(|a| a.passed).count() as f64;
        let pass_rate = if ledger.attestations.is_empty() {
            1.0
        } else {
            passed / attested
        };

        let lost = ledger.dispute_outcomes.iter().filter(|d| d.lost).count() as f64;

        let score = c.feedback_weight * mean_feedback
            + c.attestation_weight * (pass_rate * MAX_SCORE as f64)
            - c.dispute_penalty * lost;

        score.clamp(0.0, MAX_SCORE as f64)
    }
}

impl Default for ReputationEngine {
    fn default() -> Self {
        Self::new(ReputationConfig::default())
    }
}
