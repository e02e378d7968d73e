//! Avatar-video subpipeline: submit one highlight to the avatar engine and
//! poll the render to completion.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::adapter::{ServiceAdapter, ServiceCandidate};
use crate::database::models::highlight::{MAX_HIGHLIGHT_SECONDS, MIN_HIGHLIGHT_SECONDS};
use crate::database::models::{AvatarVideoTaskDbModel, HighlightDbModel};
use crate::database::repositories::AvatarVideoTaskRepository;
use crate::domain::PollSchedule;
use crate::engines::{AvatarVideoEngine, AvatarVideoOutput, AvatarVideoRequest, AvatarVideoStatus};
use crate::{Error, Result};

/// Drives one highlight through the avatar-video engine.
pub struct AvatarVideoPipeline {
    engine: Arc<dyn AvatarVideoEngine>,
    repo: Arc<dyn AvatarVideoTaskRepository>,
    adapter: ServiceAdapter,
    candidates: Vec<ServiceCandidate>,
    schedule: PollSchedule,
    image_url: String,
    style: String,
}

impl AvatarVideoPipeline {
    pub fn new(
        engine: Arc<dyn AvatarVideoEngine>,
        repo: Arc<dyn AvatarVideoTaskRepository>,
        adapter: ServiceAdapter,
        candidates: Vec<ServiceCandidate>,
        schedule: PollSchedule,
        image_url: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            repo,
            adapter,
            candidates,
            schedule,
            image_url: image_url.into(),
            style: style.into(),
        }
    }

    /// Render `highlight` as a talking-head video.
    ///
    /// The duration bound is checked locally before any remote call or
    /// record is created: a doomed submission is rejected cheaply. After a
    /// record exists, every outcome (success, provider failure, timeout)
    /// is persisted on it and the final record is returned.
    pub async fn render(
        &self,
        highlight: &HighlightDbModel,
        owner_id: &str,
    ) -> Result<AvatarVideoTaskDbModel> {
        if !(MIN_HIGHLIGHT_SECONDS..=MAX_HIGHLIGHT_SECONDS).contains(&highlight.duration) {
            return Err(Error::DurationConstraint {
                seconds: highlight.duration,
            });
        }
        let audio_url = highlight
            .audio_url
            .clone()
            .ok_or_else(|| Error::validation("highlight has no clipped audio asset"))?;

        let record = AvatarVideoTaskDbModel::new(&highlight.id, owner_id);
        self.repo.create_avatar_task(&record).await?;

        match self.submit_and_poll(&record.id, &audio_url).await {
            Ok(output) => {
                self.repo
                    .mark_succeeded(
                        &record.id,
                        &output.video_url,
                        output.thumbnail_url.as_deref(),
                        output.duration_secs,
                    )
                    .await?;
                info!(
                    avatar_task_id = %record.id,
                    highlight_id = %highlight.id,
                    "Avatar video render succeeded"
                );
            }
            Err(err) => {
                error!(
                    avatar_task_id = %record.id,
                    highlight_id = %highlight.id,
                    candidates = ?self.candidates.iter().map(|c| c.tag.as_str()).collect::<Vec<_>>(),
                    error = %err,
                    "Avatar video render failed"
                );
                self.repo.mark_failed(&record.id, &err.user_message()).await?;
            }
        }

        self.repo.get_avatar_task(&record.id).await
    }

    async fn submit_and_poll(&self, record_id: &str, audio_url: &str) -> Result<AvatarVideoOutput> {
        let request = AvatarVideoRequest {
            image_url: self.image_url.clone(),
            audio_url: audio_url.to_string(),
            style: self.style.clone(),
        };

        let engine_task_id = self
            .adapter
            .execute("avatar video submission", &self.candidates, |candidate| {
                let engine = Arc::clone(&self.engine);
                let request = request.clone();
                async move { engine.create_video(&candidate.model, &request).await }
            })
            .await?;

        self.repo.mark_submitted(record_id, &engine_task_id).await?;

        let mut attempt = 0u32;
        let mut seen_processing = false;
        while let Some(delay) = self.schedule.delay_for_attempt(attempt) {
            sleep(delay).await;
            attempt += 1;

            match self.engine.video_status(&engine_task_id).await {
                Ok(AvatarVideoStatus::Processing) => {
                    if !seen_processing {
                        self.repo.mark_processing(record_id).await?;
                        seen_processing = true;
                    }
                }
                Ok(AvatarVideoStatus::Succeeded(output)) => return Ok(output),
                Ok(AvatarVideoStatus::Failed { message }) => {
                    return Err(Error::ProviderRejected {
                        service: "avatar-video".to_string(),
                        message,
                    });
                }
                // A flaky poll is not a render failure; the next attempt
                // may see a terminal state.
                Err(err @ Error::ProviderTransient { .. }) => {
                    warn!(
                        engine_task_id = %engine_task_id,
                        attempt,
                        error = %err,
                        "Transient error polling avatar render"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        // Exhausting the attempt budget is its own failure mode, distinct
        // from a provider-reported failure.
        Err(Error::timeout("Avatar video rendering"))
    }
}
