use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{Address, AgentId, TokenAmount};

/// Registration request for a new agent. The wallet may be configured later;
/// until it is, the agent cannot receive routed payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub id: AgentId,
    pub display_name: String,
    #[serde(default)]
    pub wallet: Option<Address>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Price per request in base units. Falls back to the platform default
    /// when omitted.
    #[serde(default)]
    pub price_per_request: Option<TokenAmount>,
}

/// A registered agent. Records are never deleted; retirement flips `active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub display_name: String,
    pub wallet: Option<Address>,
    pub endpoint: Option<String>,
    pub price_per_request: TokenAmount,
    pub active: bool,
    /// Cached reputation score, refreshed by the reputation engine. The raw
    /// event log is the source of truth; this field is a materialized view.
    pub reputation: f64,
    pub staked: TokenAmount,
    pub slashed_total: TokenAmount,
    pub registered_at: DateTime<Utc>,
}
