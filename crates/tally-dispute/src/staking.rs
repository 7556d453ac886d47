use async_trait::async_trait;
use tally_types::{AgentId, TaskId, TokenAmount};
use tokio::sync::Mutex;

/// The external staking/reward collaborator. Resolution dispatches exactly
/// one of these calls per dispute; the result is logged by the coordinator
/// and never blocks the state transition.
#[async_trait]
pub trait StakingBackend: Send + Sync {
    async fn slash(&self, agent: &AgentId, amount: TokenAmount) -> anyhow::Result<()>;
    async fn refund(&self, task: &TaskId) -> anyhow::Result<()>;
}

/// A staking action observed by the recording backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingAction {
    Slash { agent: AgentId, amount: TokenAmount },
    Refund { task: TaskId },
}

/// Test double that records every dispatched action.
#[derive(Default)]
pub struct RecordingStakingBackend {
    actions: Mutex<Vec<StakingAction>>,
}

impl RecordingStakingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn actions(&self) -> Vec<StakingAction> {
        self.actions.lock().await.clone()
    }
}

#[async_trait]
impl StakingBackend for RecordingStakingBackend {
    async fn slash(&self, agent: &AgentId, amount: TokenAmount) -> anyhow::Result<()> {
        let mut actions = self.actions.lock().await;
        actions.push(StakingAction::Slash {
            agent: agent.clone(),
            amount,
        });
        Ok(())
    }

    async fn refund(&self, task: &TaskId) -> anyhow::Result<()> {
        let mut actions = self.actions.lock().await;
        actions.push(StakingAction::Refund { task: task.clone() });
        Ok(())
    }
}
