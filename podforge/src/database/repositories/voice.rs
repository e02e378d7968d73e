//! Voice preference repository.

use async_trait::async_trait;

use crate::Result;
use crate::database::DbPool;
use crate::database::models::VoicePreferenceDbModel;

/// Voice preference repository trait.
#[async_trait]
pub trait VoicePreferenceRepository: Send + Sync {
    async fn get_preference(&self, user_id: &str) -> Result<Option<VoicePreferenceDbModel>>;
    async fn upsert_preference(&self, preference: &VoicePreferenceDbModel) -> Result<()>;
}

/// SQLx implementation of VoicePreferenceRepository.
pub struct SqlxVoicePreferenceRepository {
    pool: DbPool,
}

impl SqlxVoicePreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoicePreferenceRepository for SqlxVoicePreferenceRepository {
    async fn get_preference(&self, user_id: &str) -> Result<Option<VoicePreferenceDbModel>> {
        let preference = sqlx::query_as::<_, VoicePreferenceDbModel>(
            "SELECT * FROM voice_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(preference)
    }

    async fn upsert_preference(&self, preference: &VoicePreferenceDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO voice_preferences (user_id, host1_voice_id, host2_voice_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                host1_voice_id = excluded.host1_voice_id,
                host2_voice_id = excluded.host2_voice_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&preference.user_id)
        .bind(&preference.host1_voice_id)
        .bind(&preference.host2_voice_id)
        .bind(&preference.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
