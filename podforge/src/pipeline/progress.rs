//! Durable task progress tracking.
//!
//! The orchestrator writes a snapshot before each stage's work begins; any
//! caller can read it back through the repository without touching the
//! orchestrator process.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stage::TaskStage;
use crate::Result;
use crate::database::repositories::TaskRepository;

/// Read-only progress snapshot for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: String,
    pub percent: i64,
    pub message: String,
    pub estimated_time_remaining: Option<i64>,
}

/// Writes and reads the durable progress snapshot on the task row.
#[derive(Clone)]
pub struct ProgressTracker {
    tasks: Arc<dyn TaskRepository>,
}

impl ProgressTracker {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Record that `stage` is about to start.
    ///
    /// Persisted before the stage's work so a crash mid-stage leaves an
    /// inspectable record of where the pipeline stopped.
    pub async fn begin_stage(
        &self,
        task_id: &str,
        stage: TaskStage,
        message: impl Into<String>,
    ) -> Result<()> {
        let message = message.into();
        debug!(task_id, stage = stage.as_str(), %message, "Entering stage");
        self.tasks
            .update_progress(
                task_id,
                stage.as_str(),
                stage.percent(),
                &message,
                stage.eta_seconds(),
            )
            .await
    }

    /// Update the message (and optionally a finer-grained percent) within
    /// the current stage.
    pub async fn note(
        &self,
        task_id: &str,
        stage: TaskStage,
        percent: i64,
        message: impl Into<String>,
    ) -> Result<()> {
        self.tasks
            .update_progress(
                task_id,
                stage.as_str(),
                percent,
                &message.into(),
                stage.eta_seconds(),
            )
            .await
    }

    /// Read the current snapshot for a task.
    pub async fn snapshot(&self, task_id: &str) -> Result<ProgressSnapshot> {
        let task = self.tasks.get_task(task_id).await?;
        Ok(ProgressSnapshot {
            stage: task.stage,
            percent: task.percent,
            message: task.message,
            estimated_time_remaining: task.eta_seconds,
        })
    }
}
