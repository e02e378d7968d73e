//! Avatar-video task repository.

use async_trait::async_trait;

use crate::database::models::{AvatarStatus, AvatarVideoTaskDbModel};
use crate::database::{DbPool, now_rfc3339};
use crate::{Error, Result};

/// Avatar-video task repository trait.
#[async_trait]
pub trait AvatarVideoTaskRepository: Send + Sync {
    async fn get_avatar_task(&self, id: &str) -> Result<AvatarVideoTaskDbModel>;
    async fn create_avatar_task(&self, task: &AvatarVideoTaskDbModel) -> Result<()>;
    async fn list_avatar_tasks_for_highlight(
        &self,
        highlight_id: &str,
    ) -> Result<Vec<AvatarVideoTaskDbModel>>;

    /// PENDING → SUBMITTED, persisting the engine's external id.
    async fn mark_submitted(&self, id: &str, engine_task_id: &str) -> Result<()>;

    /// SUBMITTED → PROCESSING.
    async fn mark_processing(&self, id: &str) -> Result<()>;

    /// Non-terminal → SUCCEEDED with the captured video payload.
    async fn mark_succeeded(
        &self,
        id: &str,
        video_url: &str,
        thumbnail_url: Option<&str>,
        video_duration: Option<f64>,
    ) -> Result<()>;

    /// Non-terminal → FAILED with a user-safe message.
    async fn mark_failed(&self, id: &str, message: &str) -> Result<()>;
}

/// SQLx implementation of AvatarVideoTaskRepository.
pub struct SqlxAvatarVideoTaskRepository {
    pool: DbPool,
}

impl SqlxAvatarVideoTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn transition_denied(&self, id: &str, to: AvatarStatus) -> Error {
        match self.get_avatar_task(id).await {
            Ok(current) => Error::InvalidStateTransition {
                from: current.status,
                to: to.as_str().to_string(),
            },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl AvatarVideoTaskRepository for SqlxAvatarVideoTaskRepository {
    async fn get_avatar_task(&self, id: &str) -> Result<AvatarVideoTaskDbModel> {
        sqlx::query_as::<_, AvatarVideoTaskDbModel>(
            "SELECT * FROM avatar_video_tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("AvatarVideoTask", id))
    }

    async fn create_avatar_task(&self, task: &AvatarVideoTaskDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO avatar_video_tasks (
                id, highlight_id, owner_id, engine_task_id, status, video_url,
                thumbnail_url, video_duration, error_message, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.highlight_id)
        .bind(&task.owner_id)
        .bind(&task.engine_task_id)
        .bind(&task.status)
        .bind(&task.video_url)
        .bind(&task.thumbnail_url)
        .bind(task.video_duration)
        .bind(&task.error_message)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_avatar_tasks_for_highlight(
        &self,
        highlight_id: &str,
    ) -> Result<Vec<AvatarVideoTaskDbModel>> {
        let tasks = sqlx::query_as::<_, AvatarVideoTaskDbModel>(
            "SELECT * FROM avatar_video_tasks WHERE highlight_id = ? ORDER BY created_at DESC",
        )
        .bind(highlight_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn mark_submitted(&self, id: &str, engine_task_id: &str) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE avatar_video_tasks SET status = 'SUBMITTED', engine_task_id = ?, updated_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(engine_task_id)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, AvatarStatus::Submitted).await);
        }
        Ok(())
    }

    async fn mark_processing(&self, id: &str) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE avatar_video_tasks SET status = 'PROCESSING', updated_at = ?
            WHERE id = ? AND status = 'SUBMITTED'
            "#,
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, AvatarStatus::Processing).await);
        }
        Ok(())
    }

    async fn mark_succeeded(
        &self,
        id: &str,
        video_url: &str,
        thumbnail_url: Option<&str>,
        video_duration: Option<f64>,
    ) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE avatar_video_tasks SET status = 'SUCCEEDED', video_url = ?,
                thumbnail_url = ?, video_duration = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('SUCCEEDED', 'FAILED')
            "#,
        )
        .bind(video_url)
        .bind(thumbnail_url)
        .bind(video_duration)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, AvatarStatus::Succeeded).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE avatar_video_tasks SET status = 'FAILED', error_message = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('SUCCEEDED', 'FAILED')
            "#,
        )
        .bind(message)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.transition_denied(id, AvatarStatus::Failed).await);
        }
        Ok(())
    }
}
