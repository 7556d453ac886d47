use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_types::{Address, AgentId, DisputeId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    Resolved,
}

/// A validator's vote. One per validator per dispute; the first is binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub validator: Address,
    pub approve_refund: bool,
    #[serde(default)]
    pub comment: Option<String>,
    pub cast_at: DateTime<Utc>,
}

/// The terminal decision of a resolved dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// The requester is made whole; the agent keeps its stake.
    Refund,
    /// The agent's stake is slashed.
    Slash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: DisputeOutcome,
    pub votes_for_refund: u32,
    pub votes_against_refund: u32,
    pub resolved_at: DateTime<Utc>,
}

/// A raised dispute and its voting state. Resolution is terminal: once set,
/// the vote map is frozen and exactly one slash/refund action has been
/// dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub task: TaskId,
    pub agent: AgentId,
    pub reason: String,
    pub raised_by: Address,
    pub status: DisputeStatus,
    pub votes: HashMap<Address, Vote>,
    pub resolution: Option<Resolution>,
    pub raised_at: DateTime<Utc>,
}
