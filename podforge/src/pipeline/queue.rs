//! Task queue over the durable store.
//!
//! Submission inserts a pending task row and returns immediately; workers
//! claim rows with an atomic status compare-and-set, which doubles as the
//! guard against duplicate concurrent executions of one task id.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::info;

use crate::Result;
use crate::database::models::TaskDbModel;
use crate::database::repositories::TaskRepository;
use crate::domain::{SourceInput, VoiceSelection};

/// Claim-based queue of pending tasks.
pub struct TaskQueue {
    tasks: Arc<dyn TaskRepository>,
    notify: Arc<Notify>,
}

impl TaskQueue {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a pending task and wake a worker.
    ///
    /// The input has already been validated; this never blocks on pipeline
    /// work. The caller gets the task id back and polls progress
    /// separately.
    pub async fn submit(
        &self,
        owner_id: &str,
        input: &SourceInput,
        voice_override: Option<&VoiceSelection>,
    ) -> Result<TaskDbModel> {
        let task = TaskDbModel::new(owner_id, input, voice_override);
        self.tasks.create_task(&task).await?;
        info!(task_id = %task.id, owner_id, kind = %task.input_kind, "Task submitted");
        self.notify.notify_one();
        Ok(task)
    }

    /// Claim the oldest pending task, if any.
    pub async fn claim(&self) -> Result<Option<TaskDbModel>> {
        self.tasks.claim_next_pending().await
    }

    /// Notifier used by workers to wake on new submissions.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::TaskStatus;
    use crate::database::repositories::SqlxTaskRepository;
    use crate::database::{init_pool, run_migrations};
    use crate::domain::SourceKind;

    async fn test_queue() -> TaskQueue {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        TaskQueue::new(Arc::new(SqlxTaskRepository::new(pool)))
    }

    fn raw_text(text: &str) -> SourceInput {
        SourceInput::new(SourceKind::RawText, text).unwrap()
    }

    #[tokio::test]
    async fn test_submit_creates_pending_task() {
        let queue = test_queue().await;
        let task = queue.submit("user-1", &raw_text("hello"), None).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn test_claim_transitions_to_processing_exactly_once() {
        let queue = test_queue().await;
        let submitted = queue.submit("user-1", &raw_text("hello"), None).await.unwrap();

        let first = queue.claim().await.unwrap().expect("task should be claimable");
        assert_eq!(first.id, submitted.id);
        assert_eq!(first.status, TaskStatus::Processing.as_str());

        // A second claim finds nothing: the same task never runs twice.
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claims_oldest_first() {
        let queue = test_queue().await;
        let first = queue.submit("user-1", &raw_text("one"), None).await.unwrap();
        let second = queue.submit("user-1", &raw_text("two"), None).await.unwrap();

        assert_eq!(queue.claim().await.unwrap().unwrap().id, first.id);
        assert_eq!(queue.claim().await.unwrap().unwrap().id, second.id);
    }
}
