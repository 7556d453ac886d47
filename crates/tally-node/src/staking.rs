use async_trait::async_trait;
use tally_directory::AgentDirectory;
use tally_dispute::StakingBackend;
use tally_types::{AgentId, TaskId, TokenAmount};
use tracing::info;

/// Staking collaborator backed by the agent directory.
///
/// Slashes are applied to the agent's recorded stake; refunds are
/// acknowledged and logged for the external payout pipeline to pick up.
/// Either way the dispute resolution has already committed by the time this
/// runs.
pub struct DirectoryStakingBackend {
    directory: AgentDirectory,
}

impl DirectoryStakingBackend {
    pub fn new(directory: AgentDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl StakingBackend for DirectoryStakingBackend {
    async fn slash(&self, agent: &AgentId, amount: TokenAmount) -> anyhow::Result<()> {
        let taken = self.directory.apply_slash(agent, amount).await?;
        info!(agent = %agent, requested = %amount, taken = %taken, "Slash applied to stake");
        Ok(())
    }

    async fn refund(&self, task: &TaskId) -> anyhow::Result<()> {
        info!(task = %task, "Refund authorized");
        Ok(())
    }
}
