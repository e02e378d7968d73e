//! Highlight repository.

use async_trait::async_trait;

use crate::database::DbPool;
use crate::database::models::HighlightDbModel;
use crate::{Error, Result};

/// Highlight repository trait.
#[async_trait]
pub trait HighlightRepository: Send + Sync {
    async fn get_highlight(&self, id: &str) -> Result<HighlightDbModel>;
    async fn create_highlight(&self, highlight: &HighlightDbModel) -> Result<()>;
    async fn list_highlights_for_task(&self, task_id: &str) -> Result<Vec<HighlightDbModel>>;
    async fn set_audio(&self, id: &str, audio_url: &str, storage_key: &str) -> Result<()>;
    async fn delete_highlight(&self, id: &str) -> Result<()>;
}

/// SQLx implementation of HighlightRepository.
pub struct SqlxHighlightRepository {
    pool: DbPool,
}

impl SqlxHighlightRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HighlightRepository for SqlxHighlightRepository {
    async fn get_highlight(&self, id: &str) -> Result<HighlightDbModel> {
        sqlx::query_as::<_, HighlightDbModel>("SELECT * FROM highlights WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Highlight", id))
    }

    async fn create_highlight(&self, highlight: &HighlightDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO highlights (
                id, task_id, title, description, start_time, end_time, duration,
                excerpt, audio_url, storage_key, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&highlight.id)
        .bind(&highlight.task_id)
        .bind(&highlight.title)
        .bind(&highlight.description)
        .bind(highlight.start_time)
        .bind(highlight.end_time)
        .bind(highlight.duration)
        .bind(&highlight.excerpt)
        .bind(&highlight.audio_url)
        .bind(&highlight.storage_key)
        .bind(&highlight.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_highlights_for_task(&self, task_id: &str) -> Result<Vec<HighlightDbModel>> {
        let highlights = sqlx::query_as::<_, HighlightDbModel>(
            "SELECT * FROM highlights WHERE task_id = ? ORDER BY start_time",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(highlights)
    }

    async fn set_audio(&self, id: &str, audio_url: &str, storage_key: &str) -> Result<()> {
        sqlx::query("UPDATE highlights SET audio_url = ?, storage_key = ? WHERE id = ?")
            .bind(audio_url)
            .bind(storage_key)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_highlight(&self, id: &str) -> Result<()> {
        // Avatar records are deleted via CASCADE.
        sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
