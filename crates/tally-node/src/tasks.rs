use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_types::{AgentId, DisputeId, TaskId, TxHash};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task is already disputed: {0}")]
    AlreadyDisputed(String),
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    Disputed,
}

/// A unit of work routed to an agent. Owned by the requester; status moves
/// with execution, settlement, and dispute events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub agent: AgentId,
    pub status: TaskStatus,
    pub payment_tx: Option<TxHash>,
    pub review_score: Option<u8>,
    pub dispute: Option<DisputeId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    next_id: Arc<AtomicU64>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a task. When the caller supplies no id, one is generated.
    pub async fn create(&self, id: Option<TaskId>, description: String, agent: AgentId) -> Task {
        let id = id.unwrap_or_else(|| {
            let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
            TaskId::new(format!("task-{seq:06}")).expect("generated id is non-empty")
        });

        let task = Task {
            id: id.clone(),
            description,
            agent,
            status: TaskStatus::Pending,
            payment_tx: None,
            review_score: None,
            dispute: None,
            created_at: Utc::now(),
        };

        info!(task = %id, agent = %task.agent, "Task created");
        let mut tasks = self.tasks.write().await;
        tasks.insert(id, task.clone());
        task
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(id).cloned()
    }

    /// Mark the task completed, optionally attaching the settling payment.
    pub async fn complete(&self, id: &TaskId, payment_tx: Option<TxHash>) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.status = TaskStatus::Completed;
        if payment_tx.is_some() {
            task.payment_tx = payment_tx;
        }
        Ok(task.clone())
    }

    /// Move the task into the disputed state. The atomic gate: a task
    /// carries at most one dispute at a time, so concurrent raises race here
    /// and only one proceeds to open a dispute.
    pub async fn begin_dispute(&self, id: &TaskId) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        if task.status == TaskStatus::Disputed {
            return Err(TaskError::AlreadyDisputed(id.to_string()));
        }

        task.status = TaskStatus::Disputed;
        Ok(task.clone())
    }

    /// Record the dispute id once the coordinator has assigned one.
    pub async fn attach_dispute(&self, id: &TaskId, dispute: DisputeId) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.dispute = Some(dispute);
        Ok(())
    }

    /// Resolution moves the task out of the disputed state.
    pub async fn close_dispute(&self, id: &TaskId) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.status = TaskStatus::Completed;
        Ok(task.clone())
    }

    pub async fn set_review(&self, id: &TaskId, score: u8) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.review_score = Some(score);
        Ok(())
    }

    pub async fn count(&self) -> usize {
        let tasks = self.tasks.read().await;
        tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentId {
        AgentId::new("agent-1").unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_pending_completed() {
        let registry = TaskRegistry::new();
        let task = registry.create(None, "summarize".into(), agent()).await;
        assert_eq!(task.status, TaskStatus::Pending);

        let tx = TxHash::from_bytes([1; 32]);
        let task = registry.complete(&task.id, Some(tx)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.payment_tx, Some(tx));
    }

    #[tokio::test]
    async fn test_dispute_cycle() {
        let registry = TaskRegistry::new();
        let task = registry.create(None, "summarize".into(), agent()).await;
        let dispute = DisputeId::new("dsp-000001").unwrap();

        let task = registry.begin_dispute(&task.id).await.unwrap();
        registry
            .attach_dispute(&task.id, dispute)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Disputed);

        // A second dispute on the same task is refused while one is open.
        let err = registry.begin_dispute(&task.id).await.unwrap_err();
        assert_eq!(err, TaskError::AlreadyDisputed(task.id.to_string()));

        let task = registry.close_dispute(&task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let registry = TaskRegistry::new();
        let id = TaskId::new("missing").unwrap();
        assert!(registry.get(&id).await.is_none());
        assert!(matches!(
            registry.complete(&id, None).await,
            Err(TaskError::NotFound(_))
        ));
    }
}
