use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{Address, AgentId, DisputeId, EventId, TaskId};

/// Star rating bounds accepted from reviewers.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A reviewer's star rating for one task. Late arrival (after the task is
/// long completed) is ordinary; the event id deduplicates replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: EventId,
    pub agent: AgentId,
    pub task: TaskId,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

/// A validator's pass/fail attestation of delivered work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationEvent {
    pub id: EventId,
    pub agent: AgentId,
    pub task: TaskId,
    pub validator: Address,
    pub passed: bool,
    pub at: DateTime<Utc>,
}

/// Terminal outcome of a dispute, from the agent's perspective. A lost
/// dispute carries a fixed score penalty; a won dispute carries none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeOutcomeEvent {
    pub id: EventId,
    pub agent: AgentId,
    pub dispute: DisputeId,
    pub lost: bool,
    pub at: DateTime<Utc>,
}
