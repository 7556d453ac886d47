pub mod error;
pub mod types;

pub use error::{DirectoryError, Result};
pub use types::{AgentRecord, AgentRegistration};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tally_types::{Address, AgentId, TokenAmount};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Directory configuration. The platform default price is an explicit
/// constant here, not a literal buried in resolution code.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Price applied when a request names no agent.
    pub default_price: TokenAmount,
}

/// Maps inbound request identities to payout wallets and prices.
///
/// Routing consults this before any payment flows; the error taxonomy tells
/// the caller exactly why an agent cannot be paid.
#[derive(Clone)]
pub struct AgentDirectory {
    agents: Arc<RwLock<HashMap<AgentId, AgentRecord>>>,
    config: DirectoryConfig,
}

impl AgentDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn default_price(&self) -> TokenAmount {
        self.config.default_price
    }

    pub async fn register(&self, registration: AgentRegistration) -> Result<AgentRecord> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&registration.id) {
            return Err(DirectoryError::AlreadyRegistered(
                registration.id.to_string(),
            ));
        }

        let record = AgentRecord {
            id: registration.id.clone(),
            display_name: registration.display_name,
            wallet: registration.wallet,
            endpoint: registration.endpoint,
            price_per_request: registration
                .price_per_request
                .unwrap_or(self.config.default_price),
            active: true,
            reputation: 0.0,
            staked: TokenAmount::ZERO,
            slashed_total: TokenAmount::ZERO,
            registered_at: Utc::now(),
        };

        info!(agent = %record.id, wallet = ?record.wallet.map(|w| w.to_hex()), "Agent registered");
        agents.insert(registration.id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: &AgentId) -> Option<AgentRecord> {
        let agents = self.agents.read().await;
        agents.get(id).cloned()
    }

    /// Resolve the payout wallet for a routed request.
    ///
    /// Fails with `MissingIdentifier` when no id was supplied, `NotFound`
    /// for an unknown id, `Inactive` for a disabled agent, and
    /// `Unconfigured` when the agent has no usable wallet.
    pub async fn resolve_wallet(&self, id: Option<&AgentId>) -> Result<Address> {
        let id = id.ok_or(DirectoryError::MissingIdentifier)?;
        let agents = self.agents.read().await;
        let record = agents
            .get(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;

        if !record.active {
            return Err(DirectoryError::Inactive(id.to_string()));
        }

        match record.wallet {
            Some(wallet) if !wallet.is_zero() => Ok(wallet),
            _ => Err(DirectoryError::Unconfigured(id.to_string())),
        }
    }

    /// Resolve the price for a routed request. A request that names no agent
    /// is priced at the platform default; that is a documented fallback, not
    /// an error.
    pub async fn resolve_price(&self, id: Option<&AgentId>) -> Result<TokenAmount> {
        let Some(id) = id else {
            return Ok(self.config.default_price);
        };

        let agents = self.agents.read().await;
        let record = agents
            .get(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;

        if !record.active {
            return Err(DirectoryError::Inactive(id.to_string()));
        }

        Ok(record.price_per_request)
    }

    /// Soft-disable or re-enable an agent. Records are never hard-deleted.
    pub async fn set_active(&self, id: &AgentId, active: bool) -> Result<()> {
        let mut agents = self.agents.write().await;
        let record = agents
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        record.active = active;
        info!(agent = %id, active, "Agent active flag updated");
        Ok(())
    }

    pub async fn set_wallet(&self, id: &AgentId, wallet: Address) -> Result<()> {
        let mut agents = self.agents.write().await;
        let record = agents
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        record.wallet = Some(wallet);
        Ok(())
    }

    /// Add to the agent's stake.
    pub async fn record_stake(&self, id: &AgentId, amount: TokenAmount) -> Result<TokenAmount> {
        let mut agents = self.agents.write().await;
        let record = agents
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        record.staked = record.staked.saturating_add(amount);
        Ok(record.staked)
    }

    /// Forfeit part of the agent's stake. The slash is capped at the
    /// remaining stake; the amount actually taken is returned.
    pub async fn apply_slash(&self, id: &AgentId, amount: TokenAmount) -> Result<TokenAmount> {
        let mut agents = self.agents.write().await;
        let record = agents
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;

        let taken = amount.min(record.staked);
        if taken < amount {
            warn!(
                agent = %id,
                requested = %amount,
                taken = %taken,
                "Slash capped at remaining stake"
            );
        }
        record.staked = record.staked.saturating_sub(taken);
        record.slashed_total = record.slashed_total.saturating_add(taken);

        info!(agent = %id, amount = %taken, remaining_stake = %record.staked, "Stake slashed");
        Ok(taken)
    }

    /// Refresh the cached reputation view. Single writer: the node's
    /// reputation path.
    pub async fn set_reputation(&self, id: &AgentId, score: f64) -> Result<()> {
        let mut agents = self.agents.write().await;
        let record = agents
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        record.reputation = score;
        Ok(())
    }

    pub async fn count(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            default_price: TokenAmount::from_base_units(10_000),
        }
    }

    fn registration(id: &str, wallet: Option<Address>) -> AgentRegistration {
        AgentRegistration {
            id: AgentId::new(id).unwrap(),
            display_name: format!("Agent {id}"),
            wallet,
            endpoint: None,
            price_per_request: Some(TokenAmount::from_base_units(20_000)),
        }
    }

    fn wallet() -> Address {
        Address::from_bytes([0xBB; 20])
    }

    #[tokio::test]
    async fn test_resolve_wallet_happy_path() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap();

        let id = AgentId::new("agent-1").unwrap();
        let resolved = directory.resolve_wallet(Some(&id)).await.unwrap();
        assert_eq!(resolved, wallet());
    }

    #[tokio::test]
    async fn test_missing_identifier() {
        let directory = AgentDirectory::new(config());
        let err = directory.resolve_wallet(None).await.unwrap_err();
        assert_eq!(err, DirectoryError::MissingIdentifier);
    }

    #[tokio::test]
    async fn test_unknown_agent_not_found() {
        let directory = AgentDirectory::new(config());
        let id = AgentId::new("ghost").unwrap();
        let err = directory.resolve_wallet(Some(&id)).await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound("ghost".into()));
    }

    #[tokio::test]
    async fn test_inactive_agent_rejected() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap();
        let id = AgentId::new("agent-1").unwrap();
        directory.set_active(&id, false).await.unwrap();

        let err = directory.resolve_wallet(Some(&id)).await.unwrap_err();
        assert_eq!(err, DirectoryError::Inactive("agent-1".into()));
    }

    #[tokio::test]
    async fn test_agent_without_wallet_unconfigured() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", None))
            .await
            .unwrap();

        let id = AgentId::new("agent-1").unwrap();
        let err = directory.resolve_wallet(Some(&id)).await.unwrap_err();
        assert_eq!(err, DirectoryError::Unconfigured("agent-1".into()));
    }

    #[tokio::test]
    async fn test_zero_wallet_unconfigured() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(Address::ZERO)))
            .await
            .unwrap();

        let id = AgentId::new("agent-1").unwrap();
        let err = directory.resolve_wallet(Some(&id)).await.unwrap_err();
        assert_eq!(err, DirectoryError::Unconfigured("agent-1".into()));
    }

    #[tokio::test]
    async fn test_price_falls_back_to_platform_default() {
        let directory = AgentDirectory::new(config());
        let price = directory.resolve_price(None).await.unwrap();
        assert_eq!(price, TokenAmount::from_base_units(10_000));
    }

    #[tokio::test]
    async fn test_price_of_registered_agent() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap();

        let id = AgentId::new("agent-1").unwrap();
        let price = directory.resolve_price(Some(&id)).await.unwrap();
        assert_eq!(price, TokenAmount::from_base_units(20_000));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap();
        let err = directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::AlreadyRegistered("agent-1".into()));
    }

    #[tokio::test]
    async fn test_slash_capped_at_stake() {
        let directory = AgentDirectory::new(config());
        directory
            .register(registration("agent-1", Some(wallet())))
            .await
            .unwrap();
        let id = AgentId::new("agent-1").unwrap();
        directory
            .record_stake(&id, TokenAmount::from_base_units(300_000))
            .await
            .unwrap();

        let taken = directory
            .apply_slash(&id, TokenAmount::from_base_units(500_000))
            .await
            .unwrap();

        assert_eq!(taken, TokenAmount::from_base_units(300_000));
        let record = directory.get(&id).await.unwrap();
        assert_eq!(record.staked, TokenAmount::ZERO);
        assert_eq!(record.slashed_total, TokenAmount::from_base_units(300_000));
    }
}
