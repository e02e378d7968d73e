//! Task repository.

use async_trait::async_trait;

use crate::database::models::{TaskDbModel, TaskStatus};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::{DbPool, now_rfc3339};
use crate::{Error, Result};

/// Task repository trait.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get_task(&self, id: &str) -> Result<TaskDbModel>;
    async fn create_task(&self, task: &TaskDbModel) -> Result<()>;
    async fn list_tasks_for_owner(&self, owner_id: &str, limit: i32) -> Result<Vec<TaskDbModel>>;

    /// Atomically claim the oldest pending task (PENDING → PROCESSING).
    ///
    /// The claim is the duplicate-execution guard: losing claimants see no
    /// row, so one task id never runs twice concurrently.
    async fn claim_next_pending(&self) -> Result<Option<TaskDbModel>>;

    /// Persist the progress snapshot. Written before each stage's work so a
    /// crash mid-stage leaves an inspectable record.
    async fn update_progress(
        &self,
        id: &str,
        stage: &str,
        percent: i64,
        message: &str,
        eta_seconds: Option<i64>,
    ) -> Result<()>;

    async fn set_transcript(&self, id: &str, transcript: &str) -> Result<()>;
    async fn set_summary_and_script(&self, id: &str, summary: &str, script: &str) -> Result<()>;
    async fn set_primary_audio(&self, id: &str, episode_id: &str, audio_url: &str) -> Result<()>;
    async fn set_final_audio(&self, id: &str, final_audio_url: &str) -> Result<()>;

    /// PROCESSING → COMPLETED. Fails on any other current status.
    async fn mark_completed(&self, id: &str) -> Result<()>;

    /// PENDING/PROCESSING → FAILED with a user-safe message. Terminal
    /// statuses are never overwritten.
    async fn mark_failed(&self, id: &str, message: &str) -> Result<()>;

    /// Mark tasks left PROCESSING by a previous process as FAILED.
    async fn fail_interrupted_tasks(&self, message: &str) -> Result<i32>;

    /// Delete terminal tasks older than the retention window.
    async fn cleanup_old_tasks(&self, retention_days: i32) -> Result<i32>;
}

/// SQLx implementation of TaskRepository.
pub struct SqlxTaskRepository {
    pool: DbPool,
}

impl SqlxTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Turn a zero-row guarded update into an explicit transition error.
    async fn transition_denied(&self, id: &str, to: TaskStatus) -> Error {
        match self.get_task(id).await {
            Ok(current) => Error::InvalidStateTransition {
                from: current.status,
                to: to.as_str().to_string(),
            },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn get_task(&self, id: &str) -> Result<TaskDbModel> {
        sqlx::query_as::<_, TaskDbModel>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Task", id))
    }

    async fn create_task(&self, task: &TaskDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, owner_id, input_kind, input_payload, status, stage, percent,
                message, eta_seconds, voice_host1, voice_host2, transcript,
                summary, script, audio_url, final_audio_url, episode_id,
                error_message, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.owner_id)
        .bind(&task.input_kind)
        .bind(&task.input_payload)
        .bind(&task.status)
        .bind(&task.stage)
        .bind(task.percent)
        .bind(&task.message)
        .bind(task.eta_seconds)
        .bind(&task.voice_host1)
        .bind(&task.voice_host2)
        .bind(&task.transcript)
        .bind(&task.summary)
        .bind(&task.script)
        .bind(&task.audio_url)
        .bind(&task.final_audio_url)
        .bind(&task.episode_id)
        .bind(&task.error_message)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_tasks_for_owner(&self, owner_id: &str, limit: i32) -> Result<Vec<TaskDbModel>> {
        let tasks = sqlx::query_as::<_, TaskDbModel>(
            "SELECT * FROM tasks WHERE owner_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn claim_next_pending(&self) -> Result<Option<TaskDbModel>> {
        retry_on_sqlite_busy("claim_next_pending", || async {
            let now = now_rfc3339();
            let claimed = sqlx::query_as::<_, TaskDbModel>(
                r#"
                UPDATE tasks SET status = 'PROCESSING', updated_at = ?
                WHERE id = (
                    SELECT id FROM tasks WHERE status = 'PENDING'
                    ORDER BY created_at LIMIT 1
                ) AND status = 'PENDING'
                RETURNING *
                "#,
            )
            .bind(&now)
            .fetch_optional(&self.pool)
            .await?;
            Ok(claimed)
        })
        .await
    }

    async fn update_progress(
        &self,
        id: &str,
        stage: &str,
        percent: i64,
        message: &str,
        eta_seconds: Option<i64>,
    ) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query(
            r#"
            UPDATE tasks SET stage = ?, percent = ?, message = ?, eta_seconds = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(stage)
        .bind(percent)
        .bind(message)
        .bind(eta_seconds)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_transcript(&self, id: &str, transcript: &str) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query("UPDATE tasks SET transcript = ?, updated_at = ? WHERE id = ?")
            .bind(transcript)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_summary_and_script(&self, id: &str, summary: &str, script: &str) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query("UPDATE tasks SET summary = ?, script = ?, updated_at = ? WHERE id = ?")
            .bind(summary)
            .bind(script)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_primary_audio(&self, id: &str, episode_id: &str, audio_url: &str) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query("UPDATE tasks SET episode_id = ?, audio_url = ?, updated_at = ? WHERE id = ?")
            .bind(episode_id)
            .bind(audio_url)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_final_audio(&self, id: &str, final_audio_url: &str) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query("UPDATE tasks SET final_audio_url = ?, updated_at = ? WHERE id = ?")
            .bind(final_audio_url)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = 'COMPLETED', stage = 'COMPLETED', percent = 100,
                message = 'Episode ready', eta_seconds = 0, updated_at = ?
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, TaskStatus::Completed).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = 'FAILED', stage = 'FAILED', error_message = ?,
                message = ?, eta_seconds = NULL, updated_at = ?
            WHERE id = ? AND status IN ('PENDING', 'PROCESSING')
            "#,
        )
        .bind(message)
        .bind(message)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, TaskStatus::Failed).await);
        }
        Ok(())
    }

    async fn fail_interrupted_tasks(&self, message: &str) -> Result<i32> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = 'FAILED', stage = 'FAILED', error_message = ?,
                message = ?, updated_at = ?
            WHERE status = 'PROCESSING'
            "#,
        )
        .bind(message)
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as i32)
    }

    async fn cleanup_old_tasks(&self, retention_days: i32) -> Result<i32> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
        let cutoff_str = cutoff.to_rfc3339();

        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('COMPLETED', 'FAILED') AND updated_at < ?",
        )
        .bind(&cutoff_str)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as i32)
    }
}
